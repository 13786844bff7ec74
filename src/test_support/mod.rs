//! Test utilities and mocks for Kiln unit tests.
//!
//! Provides an in-memory [`ResourceStore`] with controllable timestamps, and
//! a toy C backend whose exported entry points can be chosen per test.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::test_support::{build_toy_library, toy_spec, ToyBackend};
//!
//! #[test]
//! fn test_example() {
//!     let Some(lib) = build_toy_library(&ToyBackend::complete().without("toy_reg")) else {
//!         return; // no C compiler
//!     };
//!     // load lib.path() with toy_spec().entry_points ...
//! }
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::builder::native::NativeBuilder;
use crate::builder::toolchain::{detect_compiler, Compiler};
use crate::core::{BackendId, BackendSpec, BuildRecipe, EntryPoints, PlatformSignature, SourceEntry};
use crate::sources::{ExtractionError, ResourceStore};

/// In-memory resource store.
///
/// Every resource starts an hour in the past, so freshly extracted copies
/// are up to date. Counts how many resources were read for extraction.
#[derive(Debug)]
pub struct MemoryResources {
    files: Mutex<HashMap<String, (Vec<u8>, SystemTime)>>,
    reads: AtomicUsize,
}

impl Default for MemoryResources {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResources {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryResources {
            files: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Add a resource.
    pub fn with_file(self, id: &str, contents: impl Into<Vec<u8>>) -> Self {
        let stamp = SystemTime::now() - Duration::from_secs(3600);
        self.files
            .lock()
            .unwrap()
            .insert(id.to_string(), (contents.into(), stamp));
        self
    }

    /// Replace the contents of resource `id`, stamped a minute ahead so
    /// every cached copy is stale.
    pub fn update(&self, id: &str, contents: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(id).expect("updating unknown resource");
        *entry = (contents.into(), SystemTime::now() + Duration::from_secs(60));
    }

    /// Stamp resource `id` as modified `ahead` into the future.
    pub fn touch(&self, id: &str, ahead: Duration) {
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(id).expect("touching unknown resource");
        entry.1 = SystemTime::now() + ahead;
    }

    /// Number of resources read so far.
    pub fn extract_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ResourceStore for MemoryResources {
    fn name(&self) -> &str {
        "memory"
    }

    fn modified(&self, id: &str) -> Result<SystemTime, ExtractionError> {
        self.files
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, stamp)| *stamp)
            .ok_or_else(|| ExtractionError::Missing { id: id.to_string() })
    }

    fn read(&self, id: &str) -> Result<Cow<'_, [u8]>, ExtractionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(id)
            .map(|(contents, _)| Cow::Owned(contents.clone()))
            .ok_or_else(|| ExtractionError::Missing { id: id.to_string() })
    }
}

/// Contents and mtimes of every file under `dir`.
pub fn snapshot_dir(dir: &Path) -> BTreeMap<PathBuf, (Vec<u8>, SystemTime)> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let meta = e.metadata().unwrap();
            let contents = fs::read(e.path()).unwrap();
            (e.path().to_path_buf(), (contents, meta.modified().unwrap()))
        })
        .collect()
}

/// Set the modification time of `path`.
pub fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// The host C compiler, if any.
pub fn c_compiler() -> Option<Compiler> {
    detect_compiler(None)
}

/// A shell script standing in for a compiler, running `body`.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path, body: &str) -> Compiler {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cc");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    Compiler::new(path, crate::builder::toolchain::CompilerFamily::Gcc)
}

/// Which entry points a toy backend exports.
#[derive(Debug, Clone)]
pub struct ToyBackend {
    symbols: Vec<&'static str>,
    null_registration: bool,
}

impl ToyBackend {
    /// Exports init, is_backend, registration and log_set.
    pub fn complete() -> Self {
        ToyBackend {
            symbols: vec!["toy_init", "toy_is", "toy_reg", "toy_log_set"],
            null_registration: false,
        }
    }

    /// Drop one exported symbol.
    pub fn without(mut self, symbol: &str) -> Self {
        self.symbols.retain(|s| *s != symbol);
        self
    }

    /// Make the registration entry point return NULL.
    pub fn null_registration(mut self) -> Self {
        self.null_registration = true;
        self
    }

    /// C source of the backend.
    pub fn source(&self) -> String {
        let mut src = String::from(
            "#include <stdbool.h>\n\
             #include <stddef.h>\n\
             typedef void (*toy_log_cb)(int, const char *, void *);\n\
             static int toy_backend_state;\n\
             static int toy_registration;\n\
             static toy_log_cb toy_logger;\n\
             static void *toy_logger_data;\n",
        );
        for symbol in &self.symbols {
            src.push_str(match *symbol {
                "toy_init" => {
                    "void *toy_init(void) {\n\
                     \x20   if (toy_logger) toy_logger(2, \"toy: init\\n\", toy_logger_data);\n\
                     \x20   return &toy_backend_state;\n}\n"
                }
                "toy_is" => "bool toy_is(void *b) { return b == &toy_backend_state; }\n",
                "toy_reg" if self.null_registration => "void *toy_reg(void) { return NULL; }\n",
                "toy_reg" => "void *toy_reg(void) { return &toy_registration; }\n",
                "toy_log_set" => {
                    "void toy_log_set(toy_log_cb cb, void *data) {\n\
                     \x20   toy_logger = cb;\n\
                     \x20   toy_logger_data = data;\n}\n"
                }
                other => panic!("unknown toy symbol {other}"),
            });
        }
        // Keep unused statics referenced so -Wall stays quiet.
        src.push_str(
            "void *toy_unused(void) { (void)toy_logger; (void)toy_logger_data; \
             (void)toy_registration; return &toy_backend_state; }\n",
        );
        src
    }
}

/// Write the toy backend's `toy.c` into `dir`.
pub fn write_toy_sources(dir: &Path, toy: &ToyBackend) {
    fs::write(dir.join("toy.c"), toy.source()).unwrap();
}

/// A store holding the toy backend's source under `toy/toy.c`.
pub fn toy_store(toy: &ToyBackend) -> MemoryResources {
    MemoryResources::new().with_file("toy/toy.c", toy.source())
}

/// Recipe compiling `toy.c` alone.
pub fn toy_recipe() -> BuildRecipe {
    BuildRecipe::new(["toy.c"])
}

/// Backend description for the toy backend.
pub fn toy_spec() -> BackendSpec {
    BackendSpec {
        id: BackendId::Apple,
        name: "toy".to_string(),
        platform: PlatformSignature::any(),
        sources: vec![SourceEntry::new("toy/toy.c", "toy.c")],
        shader: None,
        recipe: toy_recipe(),
        entry_points: EntryPoints {
            init: "toy_init".to_string(),
            is_backend: "toy_is".to_string(),
            registration: "toy_reg".to_string(),
            log_set: Some("toy_log_set".to_string()),
        },
    }
}

/// A built toy library kept alive with its directory.
pub struct ToyLibrary {
    _dir: TempDir,
    path: PathBuf,
}

impl ToyLibrary {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Compile `toy` into a shared library; `None` when no compiler exists.
pub fn build_toy_library(toy: &ToyBackend) -> Option<ToyLibrary> {
    let compiler = c_compiler()?;
    let dir = TempDir::new().unwrap();
    write_toy_sources(dir.path(), toy);
    let path = dir
        .path()
        .join(format!("toy.{}", std::env::consts::DLL_EXTENSION));

    NativeBuilder::new(Some(compiler))
        .build(&toy_recipe(), dir.path(), &path)
        .unwrap();
    Some(ToyLibrary { _dir: dir, path })
}
