pub mod column_entry;
pub mod table_entry;

pub use column_entry::ColumnEntry;
pub use table_entry::TableEntry;

/// Registry files store flags as the literal strings `"0"` and `"1"`.
pub fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}
