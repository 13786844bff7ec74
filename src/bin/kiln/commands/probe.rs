//! `kiln probe` command
//!
//! Runs the provisioning pipeline for the Metal backend once and reports
//! the outcome. A forced backend that fails exits through the fatal hook.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::ProbeArgs;
use kiln::core::metal::metal;
use kiln::core::{BackendId, Policy};
use kiln::loader::InMemoryRegistry;
use kiln::ops::{GateState, Outcome};
use kiln::sources::{DirectoryResources, EmbeddedResources, ResourceStore};
use kiln::{BackendRuntime, GlobalContext, PipelineProvisioner};

#[derive(Serialize)]
struct ProbeReport {
    backend: BackendId,
    policy: Policy,
    supported: bool,
    state: GateState,
    library: Option<String>,
    reason: Option<String>,
}

pub fn execute(args: ProbeArgs, verbose: bool) -> Result<()> {
    let mut gctx = GlobalContext::new()?;
    gctx.set_verbose(verbose);

    let config = gctx.config_mut();
    if let Some(gpu) = &args.gpu {
        let policy: Policy = gpu.parse().with_context(|| format!("invalid --gpu `{}`", gpu))?;
        config.gpu.policy = Some(policy);
    }
    if args.recompile {
        config.gpu.recompile = Some(true);
    }
    if args.nocompile {
        config.gpu.nocompile = Some(true);
    }
    if let Some(cc) = args.cc {
        config.toolchain.cc = Some(cc);
    }
    if let Some(dir) = args.resources {
        config.resources.dir = Some(dir);
    }

    let store: Arc<dyn ResourceStore> = match &gctx.config().resources.dir {
        Some(dir) => Arc::new(DirectoryResources::new(dir)),
        None => {
            tracing::debug!("no resource directory configured; backend sources are unavailable");
            Arc::new(EmbeddedResources::new(&[]))
        }
    };
    let registry = Arc::new(InMemoryRegistry::new());
    let provisioner = PipelineProvisioner::from_context(&gctx, metal(), store, registry);
    let library = provisioner.artifact_path();
    let runtime = BackendRuntime::new(provisioner).with_verbose(gctx.is_verbose());

    let outcome = runtime.outcome();
    let report = ProbeReport {
        backend: runtime.backend_id(),
        policy: runtime.policy(),
        supported: outcome.is_supported(),
        state: runtime.state(),
        library: outcome
            .ready()
            .map(|b| b.path().display().to_string())
            .or_else(|| library.exists().then(|| library.display().to_string())),
        reason: match outcome {
            Outcome::Ready(_) => None,
            Outcome::Disabled(err) | Outcome::Fatal(err) => Some(err.to_string()),
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let name = report.backend.display_name();
    if report.supported {
        println!("{}: supported", name);
    } else {
        println!("{}: unsupported", name);
    }
    println!("  policy: {}", report.policy);
    println!("  state:  {}", report.state);
    if let Some(library) = &report.library {
        println!("  library: {}", library);
    }
    if let Some(reason) = &report.reason {
        println!("  reason: {}", reason);
    }
    Ok(())
}
