//! Framework targets - one web stack configuration under test

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which executable hosts a target's application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKind {
    /// Legacy stack served by IIS Express
    IisExpress,

    /// Modern stack self-hosted via `dotnet run`
    Kestrel,

    /// Any other host executable. `{path}` and `{port}` in `args` are
    /// replaced with the deploy path and port at launch.
    Command {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl HostKind {
    /// Host used when a target does not name one explicitly.
    pub fn infer_from_key(key: &str) -> Self {
        if key.contains("Core") {
            HostKind::Kestrel
        } else {
            HostKind::IisExpress
        }
    }

    /// Tag prefixed to every captured output line of the process.
    pub fn log_tag(&self) -> String {
        match self {
            HostKind::IisExpress => "IIS".to_string(),
            HostKind::Kestrel => "Kestrel".to_string(),
            HostKind::Command { program, .. } => program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.display().to_string()),
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKind::IisExpress => write!(f, "iis-express"),
            HostKind::Kestrel => write!(f, "kestrel"),
            HostKind::Command { program, .. } => write!(f, "command:{}", program.display()),
        }
    }
}

/// Immutable description of one web stack variant under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkTarget {
    /// Logical key, unique across the run
    pub key: String,

    pub host: HostKind,

    /// Deployable application directory
    pub app_path: PathBuf,

    /// Unique per run; never allocated by the harness
    pub port: u16,

    /// Route prefix the application is hosted under, e.g. `/AspNetTest`
    pub root_path: String,
}

impl FrameworkTarget {
    pub fn new(
        key: impl Into<String>,
        host: HostKind,
        app_path: impl Into<PathBuf>,
        port: u16,
        root_path: &str,
    ) -> Self {
        Self {
            key: key.into(),
            host,
            app_path: app_path.into(),
            port,
            root_path: normalize_root_path(root_path),
        }
    }

    pub fn is_modern(&self) -> bool {
        matches!(self.host, HostKind::Kestrel)
    }

    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}/ping", self.base_url(), self.root_path)
    }
}

/// Leading slash, no trailing slash; the site root becomes an empty string.
pub fn normalize_root_path(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/AspNetTest", "/AspNetTest" ; "already normalized")]
    #[test_case("AspNetTest", "/AspNetTest" ; "missing leading slash")]
    #[test_case("/AspNetTest/", "/AspNetTest" ; "trailing slash")]
    #[test_case("", "" ; "site root")]
    #[test_case("/", "" ; "bare slash")]
    #[test_case("apps/Legacy", "/apps/Legacy" ; "nested")]
    fn test_normalize_root_path(input: &str, expected: &str) {
        assert_eq!(normalize_root_path(input), expected);
    }

    #[test]
    fn test_health_url() {
        let target = FrameworkTarget::new("Asp.Net", HostKind::IisExpress, "/tmp/app", 44300, "/AspNetTest");
        assert_eq!(target.health_url(), "http://localhost:44300/AspNetTest/ping");
        assert_eq!(target.base_url(), "http://localhost:44300");
        assert!(!target.is_modern());

        let root = FrameworkTarget::new("Asp.Net.Core", HostKind::Kestrel, "/tmp/app", 5000, "");
        assert_eq!(root.health_url(), "http://localhost:5000/ping");
        assert!(root.is_modern());
    }

    #[test]
    fn test_infer_host_from_key() {
        assert_eq!(HostKind::infer_from_key("Asp.Net"), HostKind::IisExpress);
        assert_eq!(HostKind::infer_from_key("Asp.Net.Core"), HostKind::Kestrel);
    }

    #[test]
    fn test_host_kind_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            host: HostKind,
        }

        let w: Wrapper = toml::from_str(r#"host = "iis-express""#).unwrap();
        assert_eq!(w.host, HostKind::IisExpress);

        let w: Wrapper = toml::from_str(
            r#"host = { command = { program = "/usr/bin/server", args = ["--port", "{port}"] } }"#,
        )
        .unwrap();
        assert_eq!(
            w.host,
            HostKind::Command {
                program: PathBuf::from("/usr/bin/server"),
                args: vec!["--port".into(), "{port}".into()],
            }
        );
        assert_eq!(w.host.log_tag(), "server");
    }
}
