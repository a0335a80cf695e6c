pub mod error;
pub mod ids;
pub mod normalize;
pub mod raw;
pub mod record;

pub use error::CoreError;
pub use ids::*;
pub use normalize::{LabelMap, UNKNOWN_LABEL, normalize_contact, normalize_contacts};
pub use raw::{RawContact, RawField, RawTag, RawTagRef};
pub use record::{CanonicalRecord, ContactFields, FIELD_SLUGS, Tags};
