//! Process-wide backend runtime.
//!
//! A [`BackendRuntime`] is built once at startup and shared by reference.
//! The first capability query runs the provisioning pipeline behind an
//! [`InitGate`]; the policy then decides what a failure means:
//!
//! - `auto`: the backend is disabled and callers fall back
//! - forced for this backend: the process is terminated with a diagnostic
//! - forced for another backend, or disabled: never attempted

use std::ffi::c_void;
use std::fmt;
use std::io::IsTerminal;

use crate::builder::native::BuildError;
use crate::core::{BackendId, Ineligible, Policy};
use crate::loader::{BackendHandle, LoadedBackend, LogCallback};
use crate::ops::gate::{GateState, InitGate, Outcome};
use crate::ops::provision::{ProvisionError, Provisioner};
use crate::util::diagnostic::{self, suggestions, Diagnostic};

/// Called when a forced backend cannot be provided. Never returns.
pub type FatalHook = fn(&FatalError<'_>) -> !;

/// A forced backend could not be provided.
#[derive(Debug)]
pub struct FatalError<'a> {
    pub backend: BackendId,
    pub policy: Policy,
    pub cause: &'a ProvisionError,
}

impl FatalError<'_> {
    /// The message shown before the process exits.
    pub fn diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string()).with_context(self.cause.to_string());

        match self.cause {
            ProvisionError::Ineligible(Ineligible::Platform { .. }) => {
                diag = diag.with_suggestion(suggestions::PLATFORM);
            }
            ProvisionError::Build(BuildError::ToolchainMissing { hint }) => {
                diag = diag.with_suggestion(*hint);
            }
            ProvisionError::Link(_) => {
                diag = diag.with_suggestion(suggestions::RECOMPILE);
            }
            _ => {
                diag = diag.with_suggestion(suggestions::VERBOSE);
            }
        }

        diag.with_suggestion(suggestions::GPU_DISABLE)
    }
}

impl fmt::Display for FatalError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "support for --gpu {} was explicitly requested, but it wasn't available",
            self.policy.describe()
        )
    }
}

/// Default [`FatalHook`]: print the diagnostic and exit with status 1.
pub fn exit_with_diagnostic(err: &FatalError<'_>) -> ! {
    diagnostic::emit(&err.diagnostic(), std::io::stderr().is_terminal());
    std::process::exit(1)
}

/// Lazily provisioned backend with policy-driven failure handling.
pub struct BackendRuntime {
    provisioner: Box<dyn Provisioner>,
    verbose: bool,
    on_fatal: FatalHook,
    gate: InitGate<LoadedBackend, ProvisionError>,
}

impl BackendRuntime {
    pub fn new(provisioner: impl Provisioner + 'static) -> Self {
        BackendRuntime {
            provisioner: Box::new(provisioner),
            verbose: false,
            on_fatal: exit_with_diagnostic,
            gate: InitGate::new(),
        }
    }

    /// Report auto-mode failures as warnings instead of debug logs.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the default exit-on-fatal behavior.
    pub fn with_fatal_hook(mut self, hook: FatalHook) -> Self {
        self.on_fatal = hook;
        self
    }

    pub fn backend_id(&self) -> BackendId {
        self.provisioner.backend()
    }

    pub fn policy(&self) -> Policy {
        self.provisioner.policy()
    }

    /// Lifecycle state, without triggering provisioning.
    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    /// Provision on first use and return the memoized outcome.
    ///
    /// A fatal outcome invokes the fatal hook for every caller.
    pub fn outcome(&self) -> &Outcome<LoadedBackend, ProvisionError> {
        let outcome = self.gate.get_or_run(|| self.run());
        if let Outcome::Fatal(cause) = outcome {
            (self.on_fatal)(&FatalError {
                backend: self.backend_id(),
                policy: self.policy(),
                cause,
            });
        }
        outcome
    }

    /// Whether the backend is available. Provisions on first call.
    pub fn is_supported(&self) -> bool {
        self.outcome().is_supported()
    }

    /// The loaded backend, if available.
    pub fn backend(&self) -> Option<&LoadedBackend> {
        self.outcome().ready()
    }

    /// Create a backend instance; `None` when unsupported.
    pub fn backend_init(&self) -> Option<BackendHandle> {
        self.backend()?.init()
    }

    /// Whether `handle` came from this backend; false when unsupported.
    pub fn is_backend(&self, handle: BackendHandle) -> bool {
        self.backend().is_some_and(|b| b.is_backend(handle))
    }

    /// Route backend logs to `callback`. No-op when unsupported or when
    /// the library has no log entry point.
    ///
    /// # Safety
    ///
    /// See [`LoadedBackend::set_log_callback`].
    pub unsafe fn set_log_callback(&self, callback: Option<LogCallback>, user_data: *mut c_void) {
        if let Some(backend) = self.backend() {
            backend.set_log_callback(callback, user_data);
        }
    }

    fn run(&self) -> Outcome<LoadedBackend, ProvisionError> {
        let backend = self.backend_id();
        match self.provisioner.provision() {
            Ok(loaded) => {
                tracing::info!("{} support loaded", backend.display_name());
                Outcome::Ready(loaded)
            }
            Err(err) if self.policy().is_fatal_for(backend) => Outcome::Fatal(err),
            Err(err) => {
                match &err {
                    ProvisionError::Ineligible(why) => {
                        tracing::debug!("{} not attempted: {}", backend.display_name(), why);
                    }
                    _ if self.verbose => {
                        tracing::warn!("{} unavailable: {}", backend.display_name(), err);
                    }
                    _ => {
                        tracing::debug!("{} unavailable: {}", backend.display_name(), err);
                    }
                }
                Outcome::Disabled(err)
            }
        }
    }
}

impl fmt::Debug for BackendRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRuntime")
            .field("backend", &self.backend_id())
            .field("policy", &self.policy())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Platform;
    use crate::loader::InMemoryRegistry;
    use crate::ops::provision::PipelineProvisioner;
    use crate::test_support::{c_compiler, toy_spec, toy_store, ToyBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails every run after a short delay, counting runs.
    struct Failing {
        policy: Policy,
        runs: Arc<AtomicUsize>,
    }

    impl Provisioner for Failing {
        fn backend(&self) -> BackendId {
            BackendId::Apple
        }

        fn policy(&self) -> Policy {
            self.policy
        }

        fn provision(&self) -> Result<LoadedBackend, ProvisionError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            Err(BuildError::ToolchainMissing { hint: "install a compiler" }.into())
        }
    }

    fn failing(policy: Policy) -> (BackendRuntime, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let runtime = BackendRuntime::new(Failing {
            policy,
            runs: runs.clone(),
        });
        (runtime, runs)
    }

    fn panic_on_fatal(err: &FatalError<'_>) -> ! {
        panic!("{}", err.diagnostic())
    }

    #[test]
    fn test_auto_failure_disables() {
        let (runtime, runs) = failing(Policy::Auto);
        assert_eq!(runtime.state(), GateState::Uninitialized);

        assert!(!runtime.is_supported());
        assert!(!runtime.is_supported());

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.state(), GateState::Disabled);
        assert!(runtime.backend_init().is_none());
        unsafe { runtime.set_log_callback(None, std::ptr::null_mut()) };
    }

    #[test]
    #[should_panic(expected = "support for --gpu apple was explicitly requested")]
    fn test_forced_failure_is_fatal() {
        let (runtime, _runs) = failing(Policy::Forced(BackendId::Apple));
        runtime.with_fatal_hook(panic_on_fatal).is_supported();
    }

    #[test]
    fn test_forced_other_backend_is_not_fatal() {
        let (runtime, _runs) = failing(Policy::Forced(BackendId::Nvidia));
        let runtime = runtime.with_fatal_hook(panic_on_fatal);
        assert!(!runtime.is_supported());
    }

    #[test]
    fn test_concurrent_queries_run_once() {
        const CALLERS: usize = 12;
        let (runtime, runs) = failing(Policy::Auto);
        let runtime = Arc::new(runtime);
        let barrier = Arc::new(Barrier::new(CALLERS));

        let results: Vec<bool> = (0..CALLERS)
            .map(|_| {
                let runtime = runtime.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    runtime.is_supported()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&s| !s));
    }

    #[test]
    fn test_fatal_diagnostic_names_backend_and_fix() {
        let cause = ProvisionError::from(Ineligible::Platform {
            host: Platform::new("x86_64", "linux"),
            required: crate::core::PlatformSignature::exact("aarch64", "macos"),
        });
        let err = FatalError {
            backend: BackendId::Apple,
            policy: Policy::Forced(BackendId::Apple),
            cause: &cause,
        };

        let text = err.diagnostic().format(false);
        assert!(text.contains("--gpu apple"));
        assert!(text.contains("x86_64-linux"));
        assert!(text.contains(suggestions::PLATFORM));
        assert!(text.contains(suggestions::GPU_DISABLE));
    }

    #[test]
    fn test_real_backend_single_flight() {
        if c_compiler().is_none() {
            eprintln!("skipping: no C compiler");
            return;
        }
        const CALLERS: usize = 8;
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(toy_store(&ToyBackend::complete()));
        let registry = Arc::new(InMemoryRegistry::new());
        let runtime = Arc::new(
            BackendRuntime::new(
                PipelineProvisioner::new(toy_spec(), tmp.path(), store, registry.clone())
                    .with_policy(Policy::Forced(BackendId::Apple)),
            )
            .with_fatal_hook(panic_on_fatal),
        );
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let runtime = runtime.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    runtime.is_supported()
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(runtime.state(), GateState::Ready);

        let handle = runtime.backend_init().unwrap();
        assert!(runtime.is_backend(handle));
    }
}
