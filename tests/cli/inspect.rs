//! Tests for `docseal inspect`.

use crate::support::*;

use docseal::core::carrier;
use docseal::core::envelope::EnvelopeBuilder;
use docseal::core::keys::DocumentKeyPair;
use docseal::core::recipient::{KeyLocation, RecipientDirectory};

fn sealed_page(t: &Test) {
    let pair = DocumentKeyPair::generate();
    let mut directory = RecipientDirectory::new();
    directory
        .insert("local", KeyLocation::Inline(pair.public().clone()))
        .unwrap();
    directory
        .insert("google.com", KeyLocation::Inline(pair.public().clone()))
        .unwrap();

    let envelope = EnvelopeBuilder::new(&StaticFetcher::new())
        .build(PAGE_CONTENT.as_bytes(), ["subscriber"], &directory)
        .unwrap();
    t.write("sealed.html", &carrier::seal(PAGE, &envelope).unwrap());
    t.write("doc.json", &envelope.to_json().unwrap());
}

#[test]
fn test_inspect_sealed_page() {
    let t = Test::new();
    sealed_page(&t);

    let output = t.cmd().args(["inspect", "sealed.html"]).output().unwrap();
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("subscriber"));
    assert!(out.contains("local"));
    assert!(out.contains("google.com"));
}

#[test]
fn test_inspect_json() {
    let t = Test::new();
    sealed_page(&t);

    let output = t
        .cmd()
        .args(["inspect", "doc.json", "--json"])
        .output()
        .unwrap();
    assert_success(&output);

    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["accessRequirements"][0], "subscriber");
    assert_eq!(summary["recipients"].as_array().unwrap().len(), 2);
    assert!(summary["bodyLen"].as_u64().unwrap() > 0);
}

#[test]
fn test_inspect_unsealed_page() {
    let t = Test::new();
    t.write("page.html", PAGE);

    let output = t.cmd().args(["inspect", "page.html"]).output().unwrap();
    assert_failure(&output);
}
