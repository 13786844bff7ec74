//! Backend build pipeline.
//!
//! Materializes bundled sources, inlines shader headers, decides whether
//! the cached library is stale, and drives the host compiler.

pub mod freshness;
pub mod materialize;
pub mod native;
pub mod preprocess;
pub mod toolchain;

pub use freshness::{is_newer, needs_build};
pub use materialize::{materialize, Materialized};
pub use native::{build, BuildError, NativeBuilder};
pub use preprocess::{inline_headers, PreprocessError};
pub use toolchain::{detect_compiler, CompileCommand, Compiler, CompilerFamily};
