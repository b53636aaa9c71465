//! Server process launching and termination

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::registry::{ProcessRegistry, SystemRegistry};
use crate::target::HostKind;

/// How long `stop` waits for a killed process to disappear.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Starts and stops server processes for a deploy path and port.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch a server serving `path` on `port`.
    async fn start(&self, path: &Path, port: u16) -> HarnessResult<ProcessHandle>;

    /// Terminate the server previously started for `path` and `port`.
    ///
    /// Never fails: errors are logged and a missing process is a no-op.
    async fn stop(&self, path: &Path, port: u16);
}

/// Handle to a launched process.
///
/// Output draining and reaping run in background tasks for the life of the
/// process. The child is killed if the handle is released or dropped while
/// it is still running.
pub struct ProcessHandle {
    pid: Option<u32>,
    drains: Vec<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Take ownership of a spawned child: drain its output into the log and
    /// reap it when it exits.
    pub fn from_child(mut child: Child, tag: &str, port: u16) -> Self {
        let pid = child.id();
        let mut drains = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            drains.push(spawn_drain(stdout, format!("[{}] [{}]", tag, port), false));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(spawn_drain(stderr, format!("[{} ERROR] [{}]", tag, port), true));
        }

        let tag = tag.to_string();
        let reaper = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("{} on port {} exited: {}", tag, port, status),
                Err(e) => warn!("Failed waiting on {} on port {}: {}", tag, port, e),
            }
        });

        Self {
            pid,
            drains,
            reaper: Some(reaper),
        }
    }

    /// Handle for a process this harness does not own (or no process at
    /// all). Releasing it does nothing.
    pub fn external(pid: Option<u32>) -> Self {
        Self {
            pid,
            drains: Vec::new(),
            reaper: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once an owned child has exited and been reaped.
    pub fn has_exited(&self) -> bool {
        self.reaper.as_ref().map(|r| r.is_finished()).unwrap_or(false)
    }

    /// Stop draining output and drop the child, killing it if still alive.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        for drain in self.drains.drain(..) {
            drain.abort();
        }
        // Cancelling the reaper drops the child, which is kill-on-drop
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
    }
}

fn spawn_drain<R>(stream: R, prefix: String, is_stderr: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.is_empty() => {}
                Ok(Some(line)) => {
                    if is_stderr {
                        warn!("{} {}", prefix, line);
                    } else {
                        info!("{} {}", prefix, line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("{} output stream closed: {}", prefix, e);
                    break;
                }
            }
        }
    })
}

/// Fully resolved command for one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Launcher that spawns a real host executable for a [`HostKind`].
pub struct ProcessLauncher {
    host: HostKind,
    registry: Arc<dyn ProcessRegistry>,
    kill_timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(host: HostKind) -> Self {
        Self::with_registry(host, Arc::new(SystemRegistry::default()))
    }

    pub fn with_registry(host: HostKind, registry: Arc<dyn ProcessRegistry>) -> Self {
        Self {
            host,
            registry,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        }
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn host(&self) -> &HostKind {
        &self.host
    }

    /// Arguments that identify this launch in the process table. The same
    /// strings are passed on the command line so `stop` can find them again.
    pub fn arguments(&self, path: &Path, port: u16) -> Vec<String> {
        match &self.host {
            HostKind::IisExpress => vec![
                format!("/path:{}", path.display()),
                format!("/port:{}", port),
            ],
            HostKind::Kestrel => vec![
                "run".to_string(),
                "--no-build".to_string(),
                "--urls".to_string(),
                format!("http://localhost:{}", port),
                "--project".to_string(),
                path.display().to_string(),
            ],
            HostKind::Command { args, .. } => args
                .iter()
                .map(|arg| render_template(arg, path, port))
                .collect(),
        }
    }

    /// Substrings `stop` requires in a process's command line.
    pub fn match_patterns(&self, path: &Path, port: u16) -> Vec<String> {
        match &self.host {
            // `/port:` is the last argument; matching ends it on a boundary
            HostKind::IisExpress => self.arguments(path, port),
            // Trailing space keeps 5001 from matching 50010; --project follows
            HostKind::Kestrel => vec![
                format!("--urls http://localhost:{} ", port),
                path.display().to_string(),
            ],
            HostKind::Command { program, args } => {
                let mut patterns: Vec<String> = args
                    .iter()
                    .filter(|arg| arg.contains("{path}") || arg.contains("{port}"))
                    .map(|arg| render_template(arg, path, port))
                    .collect();
                if patterns.is_empty() {
                    patterns = self.arguments(path, port);
                }
                patterns.insert(0, program.display().to_string());
                patterns
            }
        }
    }

    /// Resolve the full command for a launch, locating the host executable.
    pub fn command(&self, path: &Path, port: u16) -> HarnessResult<LaunchCommand> {
        let (program, working_dir) = match &self.host {
            HostKind::IisExpress => (locate_iis_express()?, None),
            HostKind::Kestrel => (
                find_in_path("dotnet").ok_or_else(|| {
                    HarnessError::Startup("dotnet not found on PATH".to_string())
                })?,
                Some(path.to_path_buf()),
            ),
            HostKind::Command { program, .. } => (locate_program(program)?, None),
        };

        Ok(LaunchCommand {
            program,
            args: self.arguments(path, port),
            working_dir,
        })
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn start(&self, path: &Path, port: u16) -> HarnessResult<ProcessHandle> {
        if !path.is_dir() {
            return Err(HarnessError::Startup(format!(
                "Test project not found at: {}",
                path.display()
            )));
        }

        let launch = self.command(path, port)?;
        let tag = self.host.log_tag();

        info!("Starting {} on port {} for {}", tag, port, path.display());

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            HarnessError::Startup(format!(
                "Failed to spawn {}: {}",
                launch.program.display(),
                e
            ))
        })?;

        Ok(ProcessHandle::from_child(child, &tag, port))
    }

    async fn stop(&self, path: &Path, port: u16) {
        let tag = self.host.log_tag();
        let patterns = self.match_patterns(path, port);

        let entry = match self.registry.find_by_command_line(&patterns) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("No {} process found for {} on port {}", tag, path.display(), port);
                return;
            }
            Err(e) => {
                warn!("Error stopping {} process: {}", tag, e);
                return;
            }
        };

        info!(
            "Stopping {} for: {} on port {} (pid {})",
            tag,
            path.display(),
            port,
            entry.pid
        );

        if let Err(e) = self.registry.kill(entry.pid) {
            warn!("Error stopping {} process: {}", tag, e);
            return;
        }

        if wait_for_exit(self.registry.as_ref(), entry.pid, self.kill_timeout).await {
            info!("{} stopped", tag);
        } else {
            warn!(
                "{} (pid {}) did not exit within {:?}",
                tag, entry.pid, self.kill_timeout
            );
        }
    }
}

/// Poll until `pid` is gone or `timeout` elapses. Returns true if it exited.
pub async fn wait_for_exit(registry: &dyn ProcessRegistry, pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if !registry.is_running(pid) {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

fn render_template(arg: &str, path: &Path, port: u16) -> String {
    arg.replace("{path}", &path.display().to_string())
        .replace("{port}", &port.to_string())
}

fn locate_iis_express() -> HarnessResult<PathBuf> {
    ["ProgramFiles", "ProgramFiles(x86)"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(|dir| PathBuf::from(dir).join("IIS Express").join("iisexpress.exe"))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            HarnessError::Startup(
                "IIS Express not found. Please install IIS Express to run this test.".to_string(),
            )
        })
}

fn locate_program(program: &Path) -> HarnessResult<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        return Err(HarnessError::Startup(format!(
            "Host executable not found: {}",
            program.display()
        )));
    }

    find_in_path(program).ok_or_else(|| {
        HarnessError::Startup(format!("{} not found on PATH", program.display()))
    })
}

fn find_in_path(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(program).with_extension(std::env::consts::EXE_EXTENSION);
            [plain, exe]
        })
        .find(|candidate| candidate.is_file())
}
