pub mod config;
pub mod error;
pub mod systeme;
pub mod traits;

pub use config::SourceConfig;
pub use error::SourceError;
pub use systeme::SystemeClient;
pub use traits::{ContactSource, Fetched, MalformedItem};
