//! ccm node: lifecycle orchestration and tool delegation.
//!
//! # Modules
//!
//! - [`lifecycle`]: start/stop/pause/resume with readiness polling
//! - [`signals`]: shutdown signal policy per host platform
//! - [`process`]: OS-backed [`ccm_core::ProcessControl`]
//! - [`subprocess`]: scoped tool subprocesses ([`ccm_core::ToolInvoker`])
//! - [`admin`]: nodetool, query shells and other administrative tools
//! - [`sstables`]: sstable selection and discovery

pub mod admin;
pub mod lifecycle;
pub mod process;
pub mod signals;
pub mod sstables;
pub mod subprocess;

pub use admin::{Launcher, NodeAdmin, QueryShell};
pub use lifecycle::{Lifecycle, LifecycleTimings, StartOptions, StopOptions, StopReport};
pub use process::OsProcessControl;
pub use signals::{ShutdownSignal, ShutdownSignalPolicy};
pub use sstables::SstableSelection;
pub use subprocess::Subprocess;
