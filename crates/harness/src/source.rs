use contactsync_core::{RawContact, RawTag};
use contactsync_source::{ContactSource, Fetched, MalformedItem, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Contacts,
    Tags,
}

impl Endpoint {
    fn url(self) -> &'static str {
        match self {
            Self::Contacts => "scripted://contacts",
            Self::Tags => "scripted://tags",
        }
    }
}

/// In-memory stand-in for the platform API. Serves a fixed snapshot as one
/// page, optionally with undecodable contact entries, or fails one endpoint
/// with an HTTP status.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    contacts: Vec<RawContact>,
    tags: Vec<RawTag>,
    malformed: Vec<MalformedItem>,
    failure: Option<(Endpoint, u16)>,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            contacts: Vec::new(),
            tags: Vec::new(),
            malformed: Vec::new(),
            failure: None,
        }
    }

    pub fn with_snapshot(contacts: Vec<RawContact>, tags: Vec<RawTag>) -> Self {
        let mut source = Self::new();
        source.set_snapshot(contacts, tags);
        source
    }

    /// Replace the snapshot. Clears any malformed entries.
    pub fn set_snapshot(&mut self, contacts: Vec<RawContact>, tags: Vec<RawTag>) {
        self.contacts = contacts;
        self.tags = tags;
        self.malformed.clear();
    }

    pub fn set_contacts(&mut self, contacts: Vec<RawContact>) {
        self.contacts = contacts;
    }

    /// Contact listing entries that fail to decode. Indexes are positions
    /// in the listing, so decoded contacts fill the remaining slots in order.
    pub fn set_malformed(&mut self, mut malformed: Vec<MalformedItem>) {
        malformed.sort_by_key(|item| item.index);
        self.malformed = malformed;
    }

    pub fn fail(&mut self, endpoint: Endpoint, status: u16) {
        self.failure = Some((endpoint, status));
    }

    pub fn heal(&mut self) {
        self.failure = None;
    }

    fn check(&self, endpoint: Endpoint) -> Result<(), SourceError> {
        match self.failure {
            Some((failing, status)) if failing == endpoint => Err(SourceError::Status {
                endpoint: endpoint.url().to_string(),
                status,
            }),
            _ => Ok(()),
        }
    }
}

impl ContactSource for ScriptedSource {
    fn fetch_contacts(&self) -> Result<Fetched<RawContact>, SourceError> {
        self.check(Endpoint::Contacts)?;
        Ok(Fetched::new(self.contacts.clone(), 1).with_malformed(self.malformed.clone()))
    }

    fn fetch_tags(&self) -> Result<Fetched<RawTag>, SourceError> {
        self.check(Endpoint::Tags)?;
        Ok(Fetched::new(self.tags.clone(), 1))
    }
}
