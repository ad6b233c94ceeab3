//! Shared database mapping utilities
//!
//! SQLite has no array columns, so id lists are stored as JSON text.

use shiftplan_errors::{PlanningError, PlanningResult};

pub struct MappingHelpers;

impl MappingHelpers {
    /// Parse an employee id list from a JSON text column
    pub fn parse_employee_ids(row: &sqlx::sqlite::SqliteRow, field_name: &str) -> Vec<i64> {
        use sqlx::Row;
        if let Ok(Some(json_str)) = row.try_get::<Option<String>, _>(field_name) {
            serde_json::from_str(&json_str).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Serialize an employee id list into its JSON text representation
    pub fn employee_ids_to_json(ids: &[i64]) -> PlanningResult<String> {
        serde_json::to_string(ids)
            .map_err(|e| PlanningError::Serialization(format!("serializing employee ids: {e}")))
    }
}
