//! Contact and tag payloads as the systeme.io API returns them.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::ids::{ContactId, TagId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContact {
    pub id: ContactId,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub unsubscribed: Option<bool>,
    #[serde(default)]
    pub bounced: Option<bool>,
    #[serde(default)]
    pub needs_confirmation: Option<bool>,
    #[serde(default)]
    pub fields: Vec<RawField>,
    #[serde(default)]
    pub tags: Vec<RawTagRef>,
}

/// A custom attribute entry on a contact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawField {
    pub slug: String,
    #[serde(default)]
    pub value: Value,
}

impl RawField {
    /// Attribute value as text. Scalars other than strings are rendered,
    /// null and structured values yield `None`.
    pub fn text_value(&self) -> Option<String> {
        match &self.value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// A tag reference on a contact. Only the id is trusted; names are resolved
/// through the label listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTagRef {
    pub id: TagId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTag {
    pub id: TagId,
    pub name: String,
}
