//! Built-in description of the Apple Metal backend.
//!
//! The dylib is self-contained: it carries its own copy of ggml core because
//! the loaded library cannot resolve symbols from the host executable.

use crate::core::backend::{BackendSpec, BuildRecipe, EntryPoints, ShaderSpec, SourceEntry};
use crate::core::platform::PlatformSignature;
use crate::core::policy::BackendId;

/// ggml version baked into the build.
pub const GGML_VERSION: &str = "0.9.4";

/// Embedded resource id and cache-relative path of every Metal source.
///
/// Headers come first so they are on disk before any translation unit.
const SOURCES: &[(&str, &str)] = &[
    ("llama.cpp/ggml/include/ggml.h", "ggml.h"),
    ("llama.cpp/ggml/include/gguf.h", "gguf.h"),
    ("llama.cpp/ggml/include/ggml-cpu.h", "ggml-cpu.h"),
    ("llama.cpp/ggml/include/ggml-alloc.h", "ggml-alloc.h"),
    ("llama.cpp/ggml/include/ggml-backend.h", "ggml-backend.h"),
    ("llama.cpp/ggml/include/ggml-metal.h", "ggml-metal.h"),
    ("llama.cpp/ggml/src/ggml-impl.h", "ggml-impl.h"),
    ("llama.cpp/ggml/src/ggml-common.h", "ggml-common.h"),
    ("llama.cpp/ggml/src/ggml-quants.h", "ggml-quants.h"),
    ("llama.cpp/ggml/src/ggml-threading.h", "ggml-threading.h"),
    ("llama.cpp/ggml/src/ggml-backend-impl.h", "ggml-backend-impl.h"),
    ("llama.cpp/ggml/src/ggml-cpu/ggml-cpu-impl.h", "ggml-cpu/ggml-cpu-impl.h"),
    ("llama.cpp/ggml/src/ggml.c", "ggml.c"),
    ("llama.cpp/ggml/src/ggml-alloc.c", "ggml-alloc.c"),
    ("llama.cpp/ggml/src/ggml-backend.cpp", "ggml-backend.cpp"),
    ("llama.cpp/ggml/src/ggml-quants.c", "ggml-quants.c"),
    ("llama.cpp/ggml/src/ggml-threading.cpp", "ggml-threading.cpp"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal.cpp", "ggml-metal.cpp"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal.metal", "ggml-metal.metal"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-impl.h", "ggml-metal-impl.h"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-device.h", "ggml-metal-device.h"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-device.m", "ggml-metal-device.m"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-device.cpp", "ggml-metal-device.cpp"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-context.h", "ggml-metal-context.h"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-context.m", "ggml-metal-context.m"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-common.h", "ggml-metal-common.h"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-common.cpp", "ggml-metal-common.cpp"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-ops.h", "ggml-metal-ops.h"),
    ("llama.cpp/ggml/src/ggml-metal/ggml-metal-ops.cpp", "ggml-metal-ops.cpp"),
];

/// Translation units compiled into the dylib, in link order.
const TRANSLATION_UNITS: &[&str] = &[
    "ggml.c",
    "ggml-alloc.c",
    "ggml-backend.cpp",
    "ggml-threading.cpp",
    "ggml-quants.c",
    "ggml-metal.cpp",
    "ggml-metal-device.cpp",
    "ggml-metal-device.m",
    "ggml-metal-context.m",
    "ggml-metal-common.cpp",
    "ggml-metal-ops.cpp",
];

/// The Metal backend, buildable on Apple Silicon Macs.
pub fn metal() -> BackendSpec {
    let mut recipe = BuildRecipe::new(TRANSLATION_UNITS.iter().copied());
    recipe.opt_level = 3;
    recipe.pthread = true;
    recipe.defines = vec![
        ("NDEBUG".to_string(), None),
        ("TARGET_OS_OSX".to_string(), None),
        ("GGML_MULTIPLATFORM".to_string(), None),
        ("GGML_VERSION".to_string(), Some(format!("\"{}\"", GGML_VERSION))),
        ("GGML_COMMIT".to_string(), Some("\"unknown\"".to_string())),
    ];
    recipe.suppress_warnings = true;
    recipe.frameworks = vec![
        "Foundation".to_string(),
        "Metal".to_string(),
        "MetalKit".to_string(),
    ];
    recipe.libs = vec!["c++".to_string()];

    BackendSpec {
        id: BackendId::Apple,
        name: "ggml-metal".to_string(),
        platform: PlatformSignature::exact("aarch64", "macos"),
        sources: SOURCES
            .iter()
            .map(|(id, rel)| SourceEntry::new(*id, *rel))
            .collect(),
        shader: Some(ShaderSpec {
            shader: "ggml-metal.metal".into(),
            headers: vec!["ggml-common.h".into(), "ggml-metal-impl.h".into()],
        }),
        recipe,
        entry_points: EntryPoints {
            init: "ggml_backend_metal_init".to_string(),
            is_backend: "ggml_backend_is_metal".to_string(),
            registration: "ggml_backend_metal_reg".to_string(),
            log_set: Some("ggml_log_set".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;

    #[test]
    fn test_every_translation_unit_is_materialized() {
        let spec = metal();
        for tu in &spec.recipe.sources {
            assert!(
                spec.sources.iter().any(|e| &e.relative_path == tu),
                "{} is compiled but never extracted",
                tu.display()
            );
        }
    }

    #[test]
    fn test_shader_and_headers_are_materialized() {
        let spec = metal();
        let shader = spec.shader.as_ref().unwrap();
        for path in std::iter::once(&shader.shader).chain(shader.headers.iter()) {
            assert!(spec.sources.iter().any(|e| &e.relative_path == path));
        }
    }

    #[test]
    fn test_metal_targets_apple_silicon_only() {
        let spec = metal();
        assert_eq!(spec.id, BackendId::Apple);
        assert!(spec.platform.matches(&Platform::new("aarch64", "macos")));
        assert!(!spec.platform.matches(&Platform::new("x86_64", "macos")));
        assert_eq!(spec.sources.len(), 29);
    }

    #[test]
    fn test_version_define_is_quoted() {
        let spec = metal();
        let version = spec
            .recipe
            .defines
            .iter()
            .find(|(name, _)| name == "GGML_VERSION")
            .and_then(|(_, v)| v.clone());
        assert_eq!(version.as_deref(), Some("\"0.9.4\""));
    }
}
