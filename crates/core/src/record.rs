use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::ContactId;

/// Slugs of the custom attributes kept on a contact, in column order.
pub const FIELD_SLUGS: [&str; 11] = [
    "first_name",
    "surname",
    "country",
    "city",
    "postcode",
    "street_address",
    "phone_number",
    "company_name",
    "tax_number",
    "state",
    "campo_de_texto",
];

/// The fixed attribute set of a contact. Anything the source sends beyond
/// these slugs is dropped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub street_address: Option<String>,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    pub tax_number: Option<String>,
    pub state: Option<String>,
    pub campo_de_texto: Option<String>,
}

impl ContactFields {
    /// Mutable slot for a known slug, `None` for anything outside the fixed set.
    pub fn slot_mut(&mut self, slug: &str) -> Option<&mut Option<String>> {
        let slot = match slug {
            "first_name" => &mut self.first_name,
            "surname" => &mut self.surname,
            "country" => &mut self.country,
            "city" => &mut self.city,
            "postcode" => &mut self.postcode,
            "street_address" => &mut self.street_address,
            "phone_number" => &mut self.phone_number,
            "company_name" => &mut self.company_name,
            "tax_number" => &mut self.tax_number,
            "state" => &mut self.state,
            "campo_de_texto" => &mut self.campo_de_texto,
            _ => return None,
        };
        Some(slot)
    }

    pub fn get(&self, slug: &str) -> Option<&str> {
        let slot = match slug {
            "first_name" => &self.first_name,
            "surname" => &self.surname,
            "country" => &self.country,
            "city" => &self.city,
            "postcode" => &self.postcode,
            "street_address" => &self.street_address,
            "phone_number" => &self.phone_number,
            "company_name" => &self.company_name,
            "tax_number" => &self.tax_number,
            "state" => &self.state,
            "campo_de_texto" => &self.campo_de_texto,
            _ => return None,
        };
        slot.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        FIELD_SLUGS.iter().all(|slug| self.get(slug).is_none())
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Label names attached to a contact. Kept sorted and unique so that two
/// tag lists with the same members compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One contact in the shape the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: ContactId,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    pub locale: Option<String>,
    pub source_url: Option<String>,
    pub unsubscribed: Option<bool>,
    pub bounced: Option<bool>,
    pub needs_confirmation: Option<bool>,
    pub fields: ContactFields,
    pub tags: Tags,
}

impl CanonicalRecord {
    pub fn new(id: ContactId, email: impl Into<String>, registered_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email: email.into(),
            registered_at,
            locale: None,
            source_url: None,
            unsubscribed: None,
            bounced: None,
            needs_confirmation: None,
            fields: ContactFields::default(),
            tags: Tags::new(),
        }
    }
}

/// Fixed-width UTC rendering of a timestamp. Every value has the same length
/// and layout, so lexical order on the stored text is chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{text}: {e}")))
}
