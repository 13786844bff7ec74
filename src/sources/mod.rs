//! Bundled resource stores.
//!
//! A store exposes backend sources shipped with the program, either
//! compiled into the executable or laid out beside it, along with the
//! freshness comparison and extraction primitives the materializer uses.

pub mod embedded;
pub mod path;
pub mod source;

pub use embedded::{EmbeddedFile, EmbeddedResources};
pub use path::DirectoryResources;
pub use source::{ExtractionError, Freshness, ResourceStore};
