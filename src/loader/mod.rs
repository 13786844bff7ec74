//! Dynamic loading and symbol binding for built backends.
//!
//! A built artifact is opened with `libloading`, its entry points are
//! resolved into a typed [`BackendApi`], and the backend is registered with
//! the host. Binding is all-or-nothing: if a required symbol is missing the
//! library is closed and nothing is exposed. Once registered, a library is
//! never closed: the host keeps the registration handle for the rest of the
//! process.

use std::ffi::{c_char, c_int, c_void};
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use thiserror::Error;

use crate::core::EntryPoints;

pub mod registry;

pub use registry::{BackendRegistry, InMemoryRegistry, RegistrationHandle};

/// Native log callback: `void (*)(int level, const char *text, void *user_data)`.
pub type LogCallback = unsafe extern "C" fn(c_int, *const c_char, *mut c_void);

type FnInit = unsafe extern "C" fn() -> *mut c_void;
type FnIsBackend = unsafe extern "C" fn(*mut c_void) -> bool;
type FnRegistration = unsafe extern "C" fn() -> *mut c_void;
type FnLogSet = unsafe extern "C" fn(Option<LogCallback>, *mut c_void);

/// Opaque backend instance returned by the init entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHandle(NonNull<c_void>);

unsafe impl Send for BackendHandle {}
unsafe impl Sync for BackendHandle {}

impl BackendHandle {
    /// Wrap a raw handle; `None` when null.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(BackendHandle)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Error loading a built backend.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to load {}: {source}", .path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("{} is missing required symbols: {}", .path.display(), .missing.join(", "))]
    MissingSymbols { path: PathBuf, missing: Vec<String> },

    #[error("`{symbol}` returned a null registration handle")]
    NullRegistration { symbol: String },
}

/// Typed entry points of a loaded backend.
///
/// Only produced by [`bind_symbols`], which resolves every required entry
/// point or fails.
#[derive(Clone, Copy)]
pub struct BackendApi {
    init: FnInit,
    is_backend: FnIsBackend,
    registration: FnRegistration,
    log_set: Option<FnLogSet>,
}

impl std::fmt::Debug for BackendApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApi")
            .field("log_set", &self.log_set.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolve `entry_points` in `lib`.
///
/// Every missing required symbol is reported, not just the first.
pub fn bind_symbols(
    lib: &Library,
    path: &Path,
    entry_points: &EntryPoints,
) -> Result<BackendApi, LinkError> {
    let mut missing = Vec::new();

    // SAFETY: each name is paired with the signature its role defines; the
    // pointers are only called while `lib` is kept alive by `LoadedBackend`.
    let init = unsafe { lookup::<FnInit>(lib, &entry_points.init, &mut missing) };
    let is_backend = unsafe { lookup::<FnIsBackend>(lib, &entry_points.is_backend, &mut missing) };
    let registration =
        unsafe { lookup::<FnRegistration>(lib, &entry_points.registration, &mut missing) };
    let log_set = entry_points
        .log_set
        .as_deref()
        .and_then(|name| unsafe { lookup::<FnLogSet>(lib, name, &mut Vec::new()) });

    match (init, is_backend, registration) {
        (Some(init), Some(is_backend), Some(registration)) => Ok(BackendApi {
            init,
            is_backend,
            registration,
            log_set,
        }),
        _ => Err(LinkError::MissingSymbols {
            path: path.to_path_buf(),
            missing,
        }),
    }
}

unsafe fn lookup<T: Copy>(lib: &Library, name: &str, missing: &mut Vec<String>) -> Option<T> {
    match lib.get::<T>(name.as_bytes()) {
        Ok(sym) => Some(*sym),
        Err(e) => {
            tracing::debug!("symbol {} not found: {}", name, e);
            missing.push(name.to_string());
            None
        }
    }
}

/// A backend library loaded, bound and registered.
///
/// Dropping this value does not unload the library; the registry may still
/// hold its registration handle.
pub struct LoadedBackend {
    name: String,
    path: PathBuf,
    api: BackendApi,
    registration: RegistrationHandle,
    _lib: ManuallyDrop<Library>,
}

impl std::fmt::Debug for LoadedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBackend")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl LoadedBackend {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registration(&self) -> RegistrationHandle {
        self.registration
    }

    /// Create a backend instance; `None` when the backend declines.
    pub fn init(&self) -> Option<BackendHandle> {
        // SAFETY: bound with the init signature, library alive via `self`.
        BackendHandle::from_raw(unsafe { (self.api.init)() })
    }

    /// Whether `handle` belongs to this backend.
    pub fn is_backend(&self, handle: BackendHandle) -> bool {
        // SAFETY: as above; the callee only inspects the handle.
        unsafe { (self.api.is_backend)(handle.as_ptr()) }
    }

    /// Route the backend's log output to `callback`.
    ///
    /// Returns false when the library has no log entry point.
    ///
    /// # Safety
    ///
    /// `user_data` must stay valid for as long as the callback may be
    /// invoked, and `callback` must be safe to call from any thread.
    pub unsafe fn set_log_callback(
        &self,
        callback: Option<LogCallback>,
        user_data: *mut c_void,
    ) -> bool {
        match self.api.log_set {
            Some(log_set) => {
                log_set(callback, user_data);
                true
            }
            None => false,
        }
    }

    /// Whether the optional log entry point was found.
    pub fn has_log_control(&self) -> bool {
        self.api.log_set.is_some()
    }
}

/// Load the library at `path`, bind `entry_points` and register it as `name`.
///
/// Registration happens exactly once, after every required symbol is bound
/// and the registration entry point returned a non-null handle.
pub fn load_backend(
    name: &str,
    path: &Path,
    entry_points: &EntryPoints,
    registry: &dyn BackendRegistry,
) -> Result<LoadedBackend, LinkError> {
    tracing::debug!("loading {}", path.display());

    // SAFETY: the artifact was built from our own sources; its initializers
    // are the backend's and have no preconditions on us.
    let lib = unsafe { Library::new(path) }.map_err(|source| LinkError::LoadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    // `lib` is dropped, and the library closed, on every error path.
    let api = bind_symbols(&lib, path, entry_points)?;

    // SAFETY: bound with the registration signature, library alive.
    let raw = unsafe { (api.registration)() };
    let registration =
        RegistrationHandle::from_raw(raw).ok_or_else(|| LinkError::NullRegistration {
            symbol: entry_points.registration.clone(),
        })?;

    registry.register(name, registration);
    tracing::info!("{} backend registered", name);

    Ok(LoadedBackend {
        name: name.to_string(),
        path: path.to_path_buf(),
        api,
        registration,
        _lib: ManuallyDrop::new(lib),
    })
}
