//! Host engine backend registry.
//!
//! A loaded backend announces itself by handing its registration handle to
//! a [`BackendRegistry`]. How the host stores or later uses the handle is
//! its own business.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Mutex;

/// Opaque registration handle returned by a backend's registration entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationHandle(NonNull<c_void>);

// The handle is an address owned by the loaded library, which stays mapped
// for the life of the process.
unsafe impl Send for RegistrationHandle {}
unsafe impl Sync for RegistrationHandle {}

impl RegistrationHandle {
    /// Wrap a raw handle; `None` when null.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RegistrationHandle)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Accepts registration handles from freshly loaded backends.
pub trait BackendRegistry: Send + Sync {
    /// Record backend `name`. Called at most once per loaded library.
    fn register(&self, name: &str, handle: RegistrationHandle);
}

/// Registry keeping handles in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: Mutex<Vec<(String, RegistrationHandle)>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of registered backends, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Handle registered under `name`.
    pub fn get(&self, name: &str) -> Option<RegistrationHandle> {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, handle)| *handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, RegistrationHandle)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BackendRegistry for InMemoryRegistry {
    fn register(&self, name: &str, handle: RegistrationHandle) {
        tracing::debug!("registered backend {}", name);
        self.lock().push((name.to_string(), handle));
    }
}

/// Native registration function, e.g. `ggml_backend_register`.
pub type RegisterFn = unsafe extern "C" fn(*mut c_void);

/// Registry forwarding to a native registration function of the host engine.
#[derive(Debug, Clone, Copy)]
pub struct ExternRegistry {
    register: RegisterFn,
}

impl ExternRegistry {
    /// Forward registrations to `register`.
    ///
    /// # Safety
    ///
    /// `register` must accept any non-null handle produced by a backend's
    /// registration entry point and be callable from any thread.
    pub unsafe fn new(register: RegisterFn) -> Self {
        ExternRegistry { register }
    }
}

impl BackendRegistry for ExternRegistry {
    fn register(&self, name: &str, handle: RegistrationHandle) {
        tracing::debug!("forwarding registration of {} to host", name);
        // SAFETY: upheld by the caller of `ExternRegistry::new`.
        unsafe { (self.register)(handle.as_ptr()) }
    }
}
