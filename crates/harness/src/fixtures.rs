use chrono::{DateTime, Utc};
use serde_json::Value;

use contactsync_core::{ContactId, RawContact, RawField, RawTag, RawTagRef, TagId};

/// Parse an RFC 3339 instant. Panics on malformed input; test use only.
pub fn ts(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| panic!("bad fixture timestamp {rfc3339:?}: {e}"))
}

pub fn tag(id: i64, name: &str) -> RawTag {
    RawTag {
        id: TagId::new(id),
        name: name.to_string(),
    }
}

/// Shorthand for a contact with no optional attributes.
pub fn contact(id: i64, email: &str, registered_at: &str) -> RawContact {
    ContactBuilder::new(id, email, registered_at).build()
}

/// Builds API-shaped contacts for scripted snapshots.
#[derive(Debug, Clone)]
pub struct ContactBuilder {
    contact: RawContact,
}

impl ContactBuilder {
    pub fn new(id: i64, email: &str, registered_at: &str) -> Self {
        Self {
            contact: RawContact {
                id: ContactId::new(id),
                email: email.to_string(),
                registered_at: ts(registered_at),
                locale: None,
                source_url: None,
                unsubscribed: None,
                bounced: None,
                needs_confirmation: None,
                fields: Vec::new(),
                tags: Vec::new(),
            },
        }
    }

    pub fn locale(mut self, locale: &str) -> Self {
        self.contact.locale = Some(locale.to_string());
        self
    }

    pub fn source_url(mut self, url: &str) -> Self {
        self.contact.source_url = Some(url.to_string());
        self
    }

    pub fn unsubscribed(mut self, value: bool) -> Self {
        self.contact.unsubscribed = Some(value);
        self
    }

    pub fn bounced(mut self, value: bool) -> Self {
        self.contact.bounced = Some(value);
        self
    }

    pub fn field(mut self, slug: &str, value: impl Into<Value>) -> Self {
        self.contact.fields.push(RawField {
            slug: slug.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn tag(mut self, id: i64) -> Self {
        self.contact.tags.push(RawTagRef { id: TagId::new(id) });
        self
    }

    pub fn build(self) -> RawContact {
        self.contact
    }
}
