/// Terminal output helpers so every command prints the same way
use colored::*;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};

pub fn section_header(title: &str) {
    println!("\n{}", title.bold().cyan());
}

fn status_line(symbol: ColoredString, message: &str) {
    println!("{} {}", symbol, message);
}

pub fn success(message: &str) {
    status_line("✓".green(), message);
}

pub fn info(message: &str) {
    status_line("●".blue(), message);
}

pub fn warning(message: &str) {
    status_line("⚠".yellow(), message);
}

pub fn empty(message: &str) {
    status_line("◌".dimmed(), message);
}

pub fn action(message: &str) {
    status_line("▶".cyan(), message);
}

/// Errors go to stderr so stdout stays parseable
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// One `├─ label: value` line; `is_last` closes the tree
pub fn tree_item(is_last: bool, label: &str, value: Option<&str>) {
    let prefix = if is_last { "└─".dimmed() } else { "├─".dimmed() };
    match value {
        Some(value) => println!("{} {}: {}", prefix, label, value),
        None => println!("{} {}", prefix, label),
    }
}

/// Table with rounded UTF-8 borders that wraps to the terminal width
pub fn create_standard_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold).fg(TableColor::Cyan)
}

pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(2048), "2 KiB");
    }
}
