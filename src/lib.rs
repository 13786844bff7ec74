//! Kiln - runtime provisioning of optional native accelerator backends
//!
//! This crate decides whether a backend can run on the host, materializes
//! its bundled sources into a cache, builds them into a shared library with
//! the host compiler, loads and binds the library, and registers it with
//! the host engine. All of it happens lazily and at most once per process.

pub mod builder;
pub mod core;
pub mod loader;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities for Kiln unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides in-memory resource stores and toy C backends.
#[cfg(test)]
pub mod test_support;

pub use core::{BackendId, BackendSpec, Platform, Policy};
pub use loader::{BackendRegistry, LoadedBackend};
pub use ops::{BackendRuntime, PipelineProvisioner};
pub use util::context::GlobalContext;
