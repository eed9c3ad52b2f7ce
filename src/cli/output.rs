//! Shared CLI output helpers.
//!
//! Status lines go to stderr so that stdout stays clean for document
//! output. Color scheme (respects NO_COLOR):
//! - Green: success
//! - Red: errors
//! - Yellow: warnings
//! - Cyan: paths, hints
//! - Dimmed: labels, secondary info

use console::style;
use std::fmt::Display;

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// `✓ message`
pub fn success(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("✓").green(), msg);
    } else {
        eprintln!("✓ {}", msg);
    }
}

/// `✗ message`
pub fn error(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("✗").red(), msg);
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// `⚠ message`
pub fn warn(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("⚠").yellow(), msg);
    } else {
        eprintln!("⚠ {}", msg);
    }
}

/// `→ hint`
pub fn hint(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("→").cyan(), style(msg).cyan());
    } else {
        eprintln!("→ {}", msg);
    }
}

/// Bold section header on stdout.
pub fn header(title: &str) {
    if colors_enabled() {
        println!("{}", style(title).bold());
    } else {
        println!("{}", title);
    }
}

/// Key-value line on stdout, label dimmed and value bold.
pub fn kv(label: &str, value: impl Display) {
    if colors_enabled() {
        println!("  {}  {}", style(label).dim(), style(value).bold());
    } else {
        println!("  {}  {}", label, value);
    }
}

/// Bulleted item on stdout.
pub fn list_item(item: &str) {
    println!("  • {}", item);
}

/// A path, cyan when colors are on.
pub fn path(p: impl Display) -> String {
    if colors_enabled() {
        style(p).cyan().to_string()
    } else {
        p.to_string()
    }
}

/// Start a `Label... ` progress line; finish it with [`progress_done`].
pub fn progress(label: &str) {
    if colors_enabled() {
        eprint!("{}... ", style(label).dim());
    } else {
        eprint!("{}... ", label);
    }
}

pub fn progress_done(success: bool) {
    let word = if success { "ok" } else { "failed" };
    if !colors_enabled() {
        eprintln!("{}", word);
    } else if success {
        eprintln!("{}", style(word).green());
    } else {
        eprintln!("{}", style(word).red());
    }
}
