//! webcompat test harness
//!
//! Runs the same integration checks against several web stacks serving one
//! shared application side by side:
//! - Launches each stack's server process (IIS Express, Kestrel, or any
//!   command) and drains its output into the log
//! - Polls each server's `{root}/ping` endpoint with a bounded retry budget
//! - Recreates servers that never become ready, then publishes a readiness
//!   flag per target
//! - Issues `/Test/{name}` requests and compares payloads
//! - Stops every server on teardown, even when some refuse to stop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Fixture                                                    │
//! │    ├── start(): launch all, then drain readiness in order   │
//! │    ├── require_ready(key) -> FrameworkTarget                │
//! │    └── shutdown(): dispose every instance                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServerInstance (one per target, recreated on retry)        │
//! │    ├── Launcher::start / Launcher::stop                     │
//! │    │     └── ProcessRegistry (command line lookup)          │
//! │    └── HealthProber::wait_for_ready (background task)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CompatClient + cases: GET/POST /Test/{name}                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cases;
pub mod client;
pub mod error;
pub mod fixture;
pub mod instance;
pub mod launcher;
pub mod probe;
pub mod registry;
pub mod settings;
pub mod target;

pub use cases::{catalogue, run_cases, SuiteReport, TestCase};
pub use client::{CompatClient, TestModel};
pub use error::{HarnessError, HarnessResult};
pub use fixture::{Fixture, FixtureBuilder, TargetStatus};
pub use instance::{InstanceState, ServerInstance};
pub use launcher::{Launcher, ProcessHandle, ProcessLauncher};
pub use probe::{HealthProber, ProbeConfig, ProbeOutcome};
pub use registry::{ProcessEntry, ProcessRegistry, SystemRegistry};
pub use settings::{find_solution_directory, HarnessConfig, DEFAULT_CONFIG_FILE, LaunchSettings, TargetConfig};
pub use target::{FrameworkTarget, HostKind};
