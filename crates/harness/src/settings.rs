//! Harness configuration and per-project launch settings
//!
//! Targets are declared in a TOML harness config. The port and root path of
//! each target come from its project's `Properties/launchSettings.json`
//! unless both are given explicitly. Any missing or malformed field fails
//! resolution before a single process is started.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use crate::fixture::DEFAULT_MAX_START_ATTEMPTS;
use crate::probe::ProbeConfig;
use crate::target::{normalize_root_path, FrameworkTarget, HostKind};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "webcompat.toml";

/// Launch profile whose URL points at the health endpoint.
pub const PING_PROFILE: &str = "Ping (IIS Express)";

const PING_SUFFIX: &str = "/ping";

/// Walk up from `start` to the first directory holding a `*.sln` file.
pub fn find_solution_directory(start: &Path) -> HarnessResult<PathBuf> {
    debug!("Current directory: {}", start.display());

    let mut current = Some(start);
    while let Some(dir) = current {
        let has_solution = fs::read_dir(dir)
            .map(|entries| {
                entries.flatten().any(|e| {
                    e.path().extension().map(|ext| ext == "sln").unwrap_or(false)
                        && e.path().is_file()
                })
            })
            .unwrap_or(false);

        if has_solution {
            info!("Found solution directory: {}", dir.display());
            return Ok(dir.to_path_buf());
        }
        current = dir.parent();
    }

    Err(HarnessError::Config(format!(
        "Could not find solution directory above {}",
        start.display()
    )))
}

/// The two values the harness needs from a project's launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub port: u16,
    pub root_path: String,
}

impl LaunchSettings {
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join("Properties").join("launchSettings.json")
    }

    /// Read `Properties/launchSettings.json` under `project_dir`.
    pub fn load(project_dir: &Path) -> HarnessResult<Self> {
        let path = Self::path_for(project_dir);
        if !path.is_file() {
            return Err(HarnessError::Config(format!(
                "launchSettings.json not found at: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(json: &str) -> HarnessResult<Self> {
        let root: serde_json::Value = serde_json::from_str(json.trim_start_matches('\u{feff}'))?;

        let application_url = root
            .pointer("/iisSettings/iisExpress/applicationUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                HarnessError::Config("applicationUrl not found in launchSettings.json".to_string())
            })?;

        let port = Url::parse(application_url)
            .map_err(|e| {
                HarnessError::Config(format!("Invalid applicationUrl '{}': {}", application_url, e))
            })?
            .port_or_known_default()
            .ok_or_else(|| {
                HarnessError::Config(format!("applicationUrl '{}' has no port", application_url))
            })?;

        let launch_url = root
            .get("profiles")
            .and_then(|p| p.get(PING_PROFILE))
            .and_then(|p| p.get("launchUrl"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                HarnessError::Config(format!(
                    "launchUrl for {} not found in launchSettings.json",
                    PING_PROFILE
                ))
            })?;

        // Absolute URLs contribute only their path
        let ping_path = match Url::parse(launch_url) {
            Ok(url) => url.path().to_string(),
            Err(_) => launch_url.to_string(),
        };

        let root_path = ping_path.strip_suffix(PING_SUFFIX).ok_or_else(|| {
            HarnessError::Config(format!(
                "Expected launchUrl for {} to end with /ping in launchSettings.json",
                PING_PROFILE
            ))
        })?;

        Ok(Self {
            port,
            root_path: normalize_root_path(root_path),
        })
    }
}

/// One `[[targets]]` entry in the harness config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub key: String,

    /// Project directory name under `tests/apps`
    pub project: String,

    /// Defaults from the key: Kestrel for keys containing "Core"
    #[serde(default)]
    pub host: Option<HostKind>,

    /// Deploy path; relative paths are taken from the solution directory
    #[serde(default)]
    pub app_path: Option<PathBuf>,

    /// With `root_path`, skips reading launch settings
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub root_path: Option<String>,
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Discovered from the working directory when unset
    pub solution_dir: Option<PathBuf>,

    /// Build configuration the legacy sites were published from
    pub configuration: String,

    pub probe: ProbeConfig,

    pub max_start_attempts: u32,

    pub targets: Vec<TargetConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            solution_dir: None,
            configuration: if cfg!(debug_assertions) {
                "Debug".to_string()
            } else {
                "Release".to_string()
            },
            probe: ProbeConfig::default(),
            max_start_attempts: DEFAULT_MAX_START_ATTEMPTS,
            targets: vec![TargetConfig {
                key: "Asp.Net".to_string(),
                project: "AspNetTest".to_string(),
                host: None,
                app_path: None,
                port: None,
                root_path: None,
            }],
        }
    }
}

impl HarnessConfig {
    /// Load from a TOML file that must exist.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if !path.is_file() {
            return Err(HarnessError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from an implicit location, falling back to defaults when no
    /// file is there.
    pub fn load_or_default(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No harness config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn solution_dir(&self, start: &Path) -> HarnessResult<PathBuf> {
        match &self.solution_dir {
            Some(dir) if dir.is_dir() => Ok(dir.clone()),
            Some(dir) => Err(HarnessError::Config(format!(
                "Solution directory does not exist: {}",
                dir.display()
            ))),
            None => find_solution_directory(start),
        }
    }

    /// Resolve every configured target into a [`FrameworkTarget`].
    pub fn resolve(&self, start: &Path) -> HarnessResult<Vec<FrameworkTarget>> {
        let solution_dir = self.solution_dir(start)?;
        let mut keys = HashSet::new();
        let mut ports = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());

        for entry in &self.targets {
            let target = self.resolve_target(&solution_dir, entry)?;

            if !keys.insert(target.key.clone()) {
                return Err(HarnessError::Config(format!("Duplicate target key: {}", target.key)));
            }
            if !ports.insert(target.port) {
                return Err(HarnessError::Config(format!(
                    "Port {} is used by more than one target",
                    target.port
                )));
            }
            targets.push(target);
        }

        Ok(targets)
    }

    fn resolve_target(&self, solution_dir: &Path, entry: &TargetConfig) -> HarnessResult<FrameworkTarget> {
        let project_dir = solution_dir.join("tests").join("apps").join(&entry.project);
        let host = entry
            .host
            .clone()
            .unwrap_or_else(|| HostKind::infer_from_key(&entry.key));

        let (port, root_path) = match (entry.port, &entry.root_path) {
            (Some(port), Some(root)) => (port, root.clone()),
            (port, root) => {
                let settings = LaunchSettings::load(&project_dir)?;
                (
                    port.unwrap_or(settings.port),
                    root.clone().unwrap_or(settings.root_path),
                )
            }
        };

        let app_path = match &entry.app_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => solution_dir.join(path),
            None => match host {
                HostKind::Kestrel => project_dir,
                _ => solution_dir
                    .join("tests")
                    .join("bin")
                    .join(&self.configuration)
                    .join("net472")
                    .join("_PublishedWebsites")
                    .join(&entry.project),
            },
        };

        Ok(FrameworkTarget::new(entry.key.clone(), host, app_path, port, &root_path))
    }
}
