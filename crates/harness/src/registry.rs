//! Process table lookup used to find and terminate launched servers.
//!
//! Servers are located by their command line rather than by a stored pid:
//! a host may re-exec or outlive the handle that started it. Matching is
//! substring containment where each pattern must end on an argument
//! boundary, and is best-effort. When several processes match, the lowest
//! pid wins.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// A live process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command_line: String,
}

impl ProcessEntry {
    /// True if every pattern occurs in the command line ending on an
    /// argument boundary, so `/port:4430` does not match `/port:44300`.
    pub fn matches(&self, patterns: &[String]) -> bool {
        !patterns.is_empty() && patterns.iter().all(|p| contains_arg(&self.command_line, p))
    }
}

fn contains_arg(command_line: &str, pattern: &str) -> bool {
    if pattern.ends_with(char::is_whitespace) {
        return command_line.contains(pattern);
    }
    command_line.match_indices(pattern).any(|(at, _)| {
        command_line[at + pattern.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
    })
}

/// Lowest-pid entry matching all `patterns`.
pub fn first_match(mut processes: Vec<ProcessEntry>, patterns: &[String]) -> Option<ProcessEntry> {
    processes.sort_by_key(|p| p.pid);
    processes.into_iter().find(|p| p.matches(patterns))
}

pub trait ProcessRegistry: Send + Sync {
    /// First process whose command line contains all `patterns`.
    fn find_by_command_line(&self, patterns: &[String]) -> HarnessResult<Option<ProcessEntry>>;

    /// Forcibly terminate `pid`.
    fn kill(&self, pid: u32) -> HarnessResult<()>;

    fn is_running(&self, pid: u32) -> bool;
}

/// Registry backed by the operating system's process table.
///
/// Works wherever `sysinfo` can enumerate processes, which covers the
/// Windows hosts IIS Express runs on as well as Linux and macOS.
pub struct SystemRegistry {
    system: Mutex<System>,
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// All processes with a readable, non-empty command line, ordered by pid.
    pub fn list(&self) -> Vec<ProcessEntry> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let own_pid = std::process::id();
        let mut processes: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter_map(|(pid, process)| {
                let command_line = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .filter(|arg| !arg.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                (!command_line.is_empty()).then(|| ProcessEntry {
                    pid: pid.as_u32(),
                    command_line,
                })
            })
            .collect();

        processes.sort_by_key(|p| p.pid);
        processes
    }

    fn refresh(system: &mut System, pid: Pid) {
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
    }
}

impl ProcessRegistry for SystemRegistry {
    fn find_by_command_line(&self, patterns: &[String]) -> HarnessResult<Option<ProcessEntry>> {
        let processes = self.list();
        debug!("Searching {} processes for {:?}", processes.len(), patterns);
        Ok(first_match(processes, patterns))
    }

    fn kill(&self, pid: u32) -> HarnessResult<()> {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        Self::refresh(&mut system, pid);

        let process = system
            .process(pid)
            .ok_or_else(|| HarnessError::Teardown(format!("process {} not found", pid)))?;
        if process.kill() {
            Ok(())
        } else {
            Err(HarnessError::Teardown(format!("kill {} failed", pid)))
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        Self::refresh(&mut system, pid);

        system
            .process(pid)
            .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
    }
}
