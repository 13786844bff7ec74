//! Core types: backend descriptions, platform identity and user policy.

pub mod backend;
pub mod metal;
pub mod platform;
pub mod policy;

pub use backend::{BackendSpec, BuildRecipe, BuildVariant, EntryPoints, ShaderSpec, SourceEntry};
pub use platform::{detect, Ineligible, Platform, PlatformSignature};
pub use policy::{BackendId, Policy};
