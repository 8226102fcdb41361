//! JSON interchange format for card import and export.
//!
//! An import document is a JSON array of objects. Each object provides its text
//! either as `front`/`back` or as `prompt`/`completion`, plus an optional
//! `category` and `topic` name. Export writes the `front`/`back` shape so an
//! exported file can be imported again.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Category used for imported cards that do not carry one.
pub const IMPORTED_CATEGORY: &str = "Imported";

/// File name suggested to the browser for exports.
pub const EXPORT_FILE_NAME: &str = "my_flashcards.json";

/// One usable entry of an import document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItem {
    pub category: String,
    pub front: String,
    pub back: String,
    pub topic: Option<String>,
}

/// One card in an export document.
#[derive(Debug, Clone, Serialize)]
pub struct ExportItem {
    pub category: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Parse an uploaded import document into the entries that can become cards.
///
/// Entries that are not objects or lack a usable text pair are skipped.
pub fn parse_import(bytes: &[u8]) -> Result<Vec<ImportItem>, AppError> {
    let document: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::Validation(format!("Failed to process file: {}", e)))?;

    let Value::Array(entries) = document else {
        return Err(AppError::Validation(
            "Invalid JSON format. Expected a list of cards.".to_string(),
        ));
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(import_item)
        .collect())
}

fn import_item(entry: &Map<String, Value>) -> Option<ImportItem> {
    let (front, back) = text_pair(entry, "front", "back")
        .or_else(|| text_pair(entry, "prompt", "completion"))?;

    let category = non_empty(entry, "category").unwrap_or(IMPORTED_CATEGORY);
    let topic = non_empty(entry, "topic").map(str::to_string);

    Some(ImportItem {
        category: category.to_string(),
        front: front.to_string(),
        back: back.to_string(),
        topic,
    })
}

fn text_pair<'a>(
    entry: &'a Map<String, Value>,
    first: &str,
    second: &str,
) -> Option<(&'a str, &'a str)> {
    Some((non_empty(entry, first)?, non_empty(entry, second)?))
}

fn non_empty<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Render an export document.
pub fn render_export(items: &[ExportItem]) -> Result<String, AppError> {
    serde_json::to_string_pretty(items)
        .map_err(|e| AppError::Internal(format!("Failed to render export: {}", e)))
}
