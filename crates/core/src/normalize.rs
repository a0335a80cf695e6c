//! Projection of raw source contacts into [`CanonicalRecord`]s.
//!
//! Everything here is a pure function of its inputs: no I/O, no clock, no
//! global state.

use std::collections::HashMap;

use crate::ids::TagId;
use crate::raw::{RawContact, RawTag};
use crate::record::{CanonicalRecord, ContactFields, Tags};

/// Name recorded for a tag reference whose id is missing from the label listing.
pub const UNKNOWN_LABEL: &str = "unknown label";

/// Tag id to name lookup, rebuilt from the source on every run.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    names: HashMap<TagId, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a RawTag>) -> Self {
        let names = tags
            .into_iter()
            .map(|tag| (tag.id, tag.name.clone()))
            .collect();
        Self { names }
    }

    pub fn insert(&mut self, id: TagId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn resolve(&self, id: TagId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or(UNKNOWN_LABEL)
    }
}

/// Normalize a fetched batch. Output has one record per input, in order.
pub fn normalize_contacts(contacts: &[RawContact], labels: &LabelMap) -> Vec<CanonicalRecord> {
    contacts.iter().map(|c| normalize_contact(c, labels)).collect()
}

pub fn normalize_contact(contact: &RawContact, labels: &LabelMap) -> CanonicalRecord {
    let mut fields = ContactFields::default();
    for field in &contact.fields {
        if let Some(slot) = fields.slot_mut(&field.slug) {
            // Later entries for the same slug win.
            *slot = field.text_value();
        }
    }

    let tags: Tags = contact
        .tags
        .iter()
        .map(|tag| labels.resolve(tag.id).to_string())
        .collect();

    CanonicalRecord {
        id: contact.id,
        email: contact.email.clone(),
        registered_at: contact.registered_at,
        locale: contact.locale.clone(),
        source_url: contact.source_url.clone(),
        unsubscribed: contact.unsubscribed,
        bounced: contact.bounced,
        needs_confirmation: contact.needs_confirmation,
        fields,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ContactId;
    use crate::raw::{RawField, RawTagRef};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn raw(id: i64) -> RawContact {
        RawContact {
            id: ContactId::new(id),
            email: format!("contact{id}@example.com"),
            registered_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            locale: Some("es".into()),
            source_url: None,
            unsubscribed: Some(false),
            bounced: None,
            needs_confirmation: None,
            fields: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn field(slug: &str, value: serde_json::Value) -> RawField {
        RawField { slug: slug.into(), value }
    }

    #[test]
    fn preserves_order_and_count() {
        let batch = vec![raw(3), raw(1), raw(3), raw(2)];
        let out = normalize_contacts(&batch, &LabelMap::new());
        let ids: Vec<i64> = out.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![3, 1, 3, 2]);
    }

    #[test]
    fn projects_known_slugs_and_drops_the_rest() {
        let mut contact = raw(1);
        contact.fields = vec![
            field("first_name", json!("Ana")),
            field("favourite_colour", json!("teal")),
            field("city", json!("Girona")),
            field("surname", json!(null)),
        ];
        let record = normalize_contact(&contact, &LabelMap::new());
        assert_eq!(record.fields.first_name.as_deref(), Some("Ana"));
        assert_eq!(record.fields.city.as_deref(), Some("Girona"));
        assert_eq!(record.fields.surname, None);
        assert_eq!(record.fields.country, None);
        assert!(!record.fields.to_json().unwrap().contains("teal"));
    }

    #[test]
    fn resolves_tags_through_labels() {
        let labels = LabelMap::from_tags(&[
            RawTag { id: TagId::new(1), name: "vip".into() },
            RawTag { id: TagId::new(2), name: "newsletter".into() },
        ]);
        let mut contact = raw(1);
        contact.tags = vec![RawTagRef { id: TagId::new(2) }, RawTagRef { id: TagId::new(1) }];
        let record = normalize_contact(&contact, &labels);
        let names: Vec<&str> = record.tags.iter().collect();
        assert_eq!(names, vec!["newsletter", "vip"]);
    }

    #[test]
    fn unknown_label_becomes_placeholder() {
        let mut labels = LabelMap::new();
        labels.insert(TagId::new(1), "vip");
        let mut contact = raw(1);
        contact.tags = vec![RawTagRef { id: TagId::new(1) }, RawTagRef { id: TagId::new(99) }];
        let record = normalize_contact(&contact, &labels);
        assert_eq!(record.tags.len(), 2);
        assert!(record.tags.contains("vip"));
        assert!(record.tags.contains(UNKNOWN_LABEL));
        assert_eq!(UNKNOWN_LABEL, "unknown label");
    }

    #[test]
    fn copies_scalar_attributes() {
        let mut contact = raw(5);
        contact.source_url = Some("https://example.com".into());
        contact.bounced = Some(true);
        let record = normalize_contact(&contact, &LabelMap::new());
        assert_eq!(record.id, ContactId::new(5));
        assert_eq!(record.email, "contact5@example.com");
        assert_eq!(record.registered_at, contact.registered_at);
        assert_eq!(record.locale.as_deref(), Some("es"));
        assert_eq!(record.source_url.as_deref(), Some("https://example.com"));
        assert_eq!(record.unsubscribed, Some(false));
        assert_eq!(record.bounced, Some(true));
        assert_eq!(record.needs_confirmation, None);
    }
}
