//! Console output for the operator-facing report.

use colored::{ColoredString, Colorize};

const BANNER_WIDTH: usize = 60;

fn marked(marker: ColoredString, message: impl std::fmt::Display) {
    println!("{marker} {message}");
}

/// Section header framed by two rules.
#[must_use]
pub fn section_banner(title: &str) -> String {
    let rule = "-".repeat(BANNER_WIDTH);
    format!("{}\n{}\n{}", rule.bright_black(), title.cyan().bold(), rule.bright_black())
}

/// Print a section header with a blank line on either side.
pub fn print_section(title: &str) {
    println!("\n{}\n", section_banner(title));
}

pub fn print_success(message: &str) {
    marked("✓".green().bold(), message.green());
}

pub fn print_warning(message: &str) {
    marked("⚠".yellow().bold(), message.yellow());
}

pub fn print_error(message: &str) {
    marked("✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    marked("ℹ".blue().bold(), message);
}

/// Diagnostic explanation for one container.
pub fn print_note(message: &str) {
    marked("[NOTE]".magenta().bold(), message);
}

/// Indented `key: value` line.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Indented bullet, used for pod-level notes.
pub fn print_list_item(item: &str) {
    println!("  {} {item}", "•".bright_black());
}
