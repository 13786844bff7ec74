//! Command implementations

pub mod cache;
pub mod probe;
pub mod toolchain;
