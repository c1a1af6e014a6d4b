pub mod repo;
pub mod sqlite;

use crate::error::{Error, Result};

pub const DEFAULT_TABLE: &str = "tweet";

/// Table names are spliced into SQL, so only plain identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("invalid table name '{table}'")))
    }
}
