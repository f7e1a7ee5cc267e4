//! Wire types for `timelineDetailV2` responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailResponse {
    pub id: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A display section. `data` depends on `type`: an object for `header`,
/// an array of rows for `table`, an array of documents for `documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub title: String,
    #[serde(default)]
    pub detail: Option<RowDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDetail {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub detail_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub id: String,
    pub title: String,
    /// Display date, `dd.mm.yyyy`.
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub action: Option<DocumentAction>,
    #[serde(default)]
    pub postbox_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub payload: Option<Value>,
}
