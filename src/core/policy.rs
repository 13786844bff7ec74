//! User backend policy.
//!
//! The policy decides both whether a backend may be tried at all and how a
//! failure to provide it is treated: silently under `auto`, fatally when the
//! user asked for that backend by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An accelerator backend that can be provisioned at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Apple Metal
    Apple,
    /// NVIDIA CUDA
    Nvidia,
    /// AMD ROCm/HIP
    Amd,
}

impl BackendId {
    /// The canonical policy spelling of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Apple => "apple",
            BackendId::Nvidia => "nvidia",
            BackendId::Amd => "amd",
        }
    }

    /// Human-readable name of the API behind the backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendId::Apple => "Apple Metal",
            BackendId::Nvidia => "NVIDIA CUDA",
            BackendId::Amd => "AMD ROCm",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user wants GPU backends handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Policy {
    /// Use whatever backend is available, fall back to CPU silently.
    #[default]
    Auto,
    /// Never try to provision a backend.
    Disabled,
    /// Require this specific backend; failing to provide it is fatal.
    Forced(BackendId),
}

impl Policy {
    /// Whether this policy permits trying `backend`.
    pub fn allows(&self, backend: BackendId) -> bool {
        match self {
            Policy::Auto => true,
            Policy::Disabled => false,
            Policy::Forced(wanted) => *wanted == backend,
        }
    }

    /// Whether a failure to provide `backend` must terminate the process.
    pub fn is_fatal_for(&self, backend: BackendId) -> bool {
        matches!(self, Policy::Forced(wanted) if *wanted == backend)
    }

    /// The flag value that selects this policy, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Policy::Auto => "auto",
            Policy::Disabled => "disable",
            Policy::Forced(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Error parsing a policy string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid gpu policy `{0}`; expected one of: auto, apple, nvidia, amd, disable")]
pub struct PolicyParseError(pub String);

impl FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Policy::Auto),
            "disable" | "disabled" | "none" | "cpu" => Ok(Policy::Disabled),
            "apple" | "metal" => Ok(Policy::Forced(BackendId::Apple)),
            "nvidia" | "cuda" => Ok(Policy::Forced(BackendId::Nvidia)),
            "amd" | "rocm" | "hip" => Ok(Policy::Forced(BackendId::Amd)),
            _ => Err(PolicyParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Policy {
    type Error = PolicyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Policy> for String {
    fn from(p: Policy) -> Self {
        p.describe().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!("auto".parse::<Policy>().unwrap(), Policy::Auto);
        assert_eq!("METAL".parse::<Policy>().unwrap(), Policy::Forced(BackendId::Apple));
        assert_eq!("cuda".parse::<Policy>().unwrap(), Policy::Forced(BackendId::Nvidia));
        assert_eq!("disable".parse::<Policy>().unwrap(), Policy::Disabled);
        assert!("vulkan".parse::<Policy>().is_err());
    }

    #[test]
    fn test_allows() {
        assert!(Policy::Auto.allows(BackendId::Apple));
        assert!(!Policy::Disabled.allows(BackendId::Apple));
        assert!(Policy::Forced(BackendId::Apple).allows(BackendId::Apple));
        assert!(!Policy::Forced(BackendId::Nvidia).allows(BackendId::Apple));
    }

    #[test]
    fn test_fatal_only_for_requested_backend() {
        assert!(!Policy::Auto.is_fatal_for(BackendId::Apple));
        assert!(Policy::Forced(BackendId::Apple).is_fatal_for(BackendId::Apple));
        assert!(!Policy::Forced(BackendId::Amd).is_fatal_for(BackendId::Apple));
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: Policy,
        }

        let w: Wrapper = toml::from_str("policy = \"apple\"").unwrap();
        assert_eq!(w.policy, Policy::Forced(BackendId::Apple));
    }
}
