pub mod fixtures;
pub mod mirror;
pub mod source;
pub mod store;

pub use fixtures::{ContactBuilder, contact, tag, ts};
pub use mirror::TestMirror;
pub use source::{Endpoint, ScriptedSource};
pub use store::FlakyStore;
