//! Host platform identity and backend eligibility.

use std::fmt;

use serde::Serialize;

use crate::core::policy::{BackendId, Policy};

/// Architecture and operating system of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    /// CPU architecture (x86_64, aarch64, etc.)
    pub arch: String,
    /// Operating system (linux, macos, windows, etc.)
    pub os: String,
}

impl Platform {
    /// Create a platform from its components.
    pub fn new(arch: &str, os: &str) -> Self {
        Platform {
            arch: arch.to_string(),
            os: os.to_string(),
        }
    }

    /// Detect the host platform.
    pub fn host() -> Self {
        Platform::new(std::env::consts::ARCH, std::env::consts::OS)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

/// The set of platforms a backend can run on.
///
/// `None` components match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSignature {
    pub arch: Option<&'static str>,
    pub os: Option<&'static str>,
}

impl PlatformSignature {
    /// Matches exactly one architecture on one OS.
    pub const fn exact(arch: &'static str, os: &'static str) -> Self {
        PlatformSignature {
            arch: Some(arch),
            os: Some(os),
        }
    }

    /// Matches any platform with the given OS.
    pub const fn os(os: &'static str) -> Self {
        PlatformSignature {
            arch: None,
            os: Some(os),
        }
    }

    /// Matches every platform.
    pub const fn any() -> Self {
        PlatformSignature { arch: None, os: None }
    }

    /// Whether `platform` satisfies this signature.
    pub fn matches(&self, platform: &Platform) -> bool {
        self.arch.map_or(true, |a| a == platform.arch) && self.os.map_or(true, |o| o == platform.os)
    }
}

impl fmt::Display for PlatformSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.arch.unwrap_or("*"),
            self.os.unwrap_or("*")
        )
    }
}

/// Why a backend may not be tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// The host does not match the backend's platform signature.
    Platform {
        host: Platform,
        required: PlatformSignature,
    },
    /// The user's policy excludes this backend.
    Policy(Policy),
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligible::Platform { host, required } => {
                write!(f, "host platform {} does not match {}", host, required)
            }
            Ineligible::Policy(policy) => write!(f, "excluded by gpu policy `{}`", policy),
        }
    }
}

impl std::error::Error for Ineligible {}

/// Decide whether `backend` may be provisioned on `platform` under `policy`.
///
/// Pure: reads nothing beyond its arguments.
pub fn detect(
    platform: &Platform,
    required: PlatformSignature,
    policy: Policy,
    backend: BackendId,
) -> Result<(), Ineligible> {
    if !required.matches(platform) {
        return Err(Ineligible::Platform {
            host: platform.clone(),
            required,
        });
    }

    if !policy.allows(backend) {
        return Err(Ineligible::Policy(policy));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SILICON: PlatformSignature = PlatformSignature::exact("aarch64", "macos");

    #[test]
    fn test_host_is_populated() {
        let host = Platform::host();
        assert!(!host.arch.is_empty());
        assert!(!host.os.is_empty());
    }

    #[test]
    fn test_signature_matching() {
        let mac = Platform::new("aarch64", "macos");
        let intel_mac = Platform::new("x86_64", "macos");

        assert!(SILICON.matches(&mac));
        assert!(!SILICON.matches(&intel_mac));
        assert!(PlatformSignature::os("macos").matches(&intel_mac));
        assert!(PlatformSignature::any().matches(&Platform::new("riscv64", "linux")));
    }

    #[test]
    fn test_detect_requires_platform_and_policy() {
        let mac = Platform::new("aarch64", "macos");
        let linux = Platform::new("x86_64", "linux");

        assert!(detect(&mac, SILICON, Policy::Auto, BackendId::Apple).is_ok());
        assert!(detect(&mac, SILICON, Policy::Forced(BackendId::Apple), BackendId::Apple).is_ok());
        assert_eq!(
            detect(&mac, SILICON, Policy::Disabled, BackendId::Apple),
            Err(Ineligible::Policy(Policy::Disabled))
        );
        assert!(matches!(
            detect(&mac, SILICON, Policy::Forced(BackendId::Nvidia), BackendId::Apple),
            Err(Ineligible::Policy(_))
        ));
        assert!(matches!(
            detect(&linux, SILICON, Policy::Auto, BackendId::Apple),
            Err(Ineligible::Platform { .. })
        ));
    }
}
