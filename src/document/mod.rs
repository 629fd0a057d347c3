//! Layout document serialization.
//!
//! The export/import schema mirrors the registry's display order:
//! `{ exposedGlobals, widgets: [{ size, widgetData, widgetGlobals,
//! position }] }`. Exports are pretty-printed. Import parsing is split in
//! two stages so the engine can honor the destructive-clear contract:
//! unparseable JSON is rejected before any state is touched, while a
//! parseable document with a malformed `widgets` field fails only after
//! the surface has been cleared.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{CellPos, CellSize};
use crate::registry::WidgetPayload;
use crate::sandbox::GlobalMap;

/// One widget entry in display order.
///
/// `position` is optional on the way in — entries without one fall back to
/// the placement solver — but exports always carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetEntry {
    pub size: CellSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_data: Option<WidgetPayload>,
    #[serde(default, skip_serializing_if = "GlobalMap::is_empty")]
    pub widget_globals: GlobalMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CellPos>,
}

/// Serialized form of an entire surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    #[serde(default)]
    pub exposed_globals: GlobalMap,
    pub widgets: Vec<WidgetEntry>,
}

impl LayoutDocument {
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// First import stage: syntactic parse only.
///
/// `Err` means the input was not JSON at all; the caller must leave its
/// state untouched. The returned [`Value`] feeds [`decode_document`].
pub fn parse_document(json: &str) -> serde_json::Result<Value> {
    serde_json::from_str(json)
}

/// A validated import: `exposed_globals` is `None` when the document did
/// not carry an object-shaped `exposedGlobals` field, in which case the
/// importer keeps its prior surface-tier globals.
#[derive(Debug, Clone)]
pub struct ImportedDocument {
    pub exposed_globals: Option<GlobalMap>,
    pub widgets: Vec<WidgetEntry>,
}

/// Second import stage: schema validation of an already-parsed value.
///
/// Runs after the caller has destructively cleared its state, so a failure
/// here (e.g. `widgets` is not an array) leaves the surface empty.
pub fn decode_document(value: Value) -> Result<ImportedDocument, String> {
    let Value::Object(mut root) = value else {
        return Err("document root is not an object".to_string());
    };

    let exposed_globals = match root.remove("exposedGlobals") {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };

    let widgets_value = root.remove("widgets").unwrap_or(Value::Null);
    if !widgets_value.is_array() {
        return Err("`widgets` is not an array".to_string());
    }

    let widgets: Vec<WidgetEntry> =
        serde_json::from_value(widgets_value).map_err(|err| err.to_string())?;

    Ok(ImportedDocument {
        exposed_globals,
        widgets,
    })
}
