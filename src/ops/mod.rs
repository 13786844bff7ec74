//! High-level operations.
//!
//! The initialization gate, the provisioning pipeline, and the runtime that
//! ties them to a policy.

pub mod gate;
pub mod provision;
pub mod runtime;

pub use gate::{GateState, InitGate, Outcome};
pub use provision::{PipelineProvisioner, ProvisionError, ProvisionOptions, Provisioner};
pub use runtime::{exit_with_diagnostic, BackendRuntime, FatalError, FatalHook};
