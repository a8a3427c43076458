//! External process invocation with bounded waits
//!
//! Every call to the calibration tool goes through [`ProcessRunner`], so the
//! executor and the monitor catalog can be driven by a scripted runner in tests.

use crate::error::ProcessError;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments joined with spaces, for log lines
    pub fn args_display(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub trait ProcessRunner {
    /// Run to completion and return the exit code (`None` if the process was
    /// terminated without one). Exceeding `timeout` is an error.
    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<Option<i32>, ProcessError>;

    /// Run and return stdout followed by stderr. The exit code is ignored and
    /// a process that overruns `timeout` is killed; whatever it printed is
    /// still returned.
    fn capture(&self, invocation: &Invocation, timeout: Duration) -> Result<String, ProcessError>;
}

/// Spawns real child processes with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(ref dir) = invocation.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }

    fn spawn(invocation: &Invocation, capture: bool) -> Result<Child, ProcessError> {
        let output = || if capture { Stdio::piped() } else { Stdio::null() };
        Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.clone(),
                source,
            })
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<Option<i32>, ProcessError> {
        debug!(
            "Running {} {}",
            invocation.program.display(),
            invocation.args_display()
        );

        let mut child = Self::spawn(invocation, false)?;
        match wait_bounded(&mut child, &invocation.program, timeout)? {
            Some(status) => Ok(status.code()),
            None => Err(ProcessError::TimedOut {
                program: invocation.program.clone(),
                timeout,
            }),
        }
    }

    fn capture(&self, invocation: &Invocation, timeout: Duration) -> Result<String, ProcessError> {
        debug!(
            "Capturing {} {}",
            invocation.program.display(),
            invocation.args_display()
        );

        let mut child = Self::spawn(invocation, true)?;

        // Drain both pipes on their own threads so a chatty child cannot
        // block on a full pipe while we wait on it.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        if wait_bounded(&mut child, &invocation.program, timeout)?.is_none() {
            warn!(
                "{} overran {:?}, using partial output",
                invocation.program.display(),
                timeout
            );
        }

        let mut output = String::new();
        for reader in [stdout, stderr].into_iter().flatten() {
            let text = reader
                .join()
                .unwrap_or_else(|_| Ok(String::new()))
                .map_err(|source| ProcessError::Output {
                    program: invocation.program.clone(),
                    source,
                })?;
            output.push_str(&text);
        }

        Ok(output)
    }
}

/// Wait up to `timeout`; on expiry kill and reap the child and return `None`
fn wait_bounded(
    child: &mut Child,
    program: &Path,
    timeout: Duration,
) -> Result<Option<ExitStatus>, ProcessError> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(Some(status)),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(None)
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ProcessError::Wait {
                program: program.to_path_buf(),
                source,
            })
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_run_reports_exit_code() {
        let runner = SystemProcessRunner;
        let ok = runner.run(&sh("exit 0"), Duration::from_secs(5)).unwrap();
        assert_eq!(ok, Some(0));

        let failed = runner.run(&sh("exit 3"), Duration::from_secs(5)).unwrap();
        assert_eq!(failed, Some(3));
    }

    #[test]
    fn test_run_times_out() {
        let runner = SystemProcessRunner;
        let result = runner.run(&sh("sleep 5"), Duration::from_millis(100));
        assert!(matches!(result, Err(ProcessError::TimedOut { .. })));
    }

    #[test]
    fn test_run_missing_program_is_spawn_error() {
        let runner = SystemProcessRunner;
        let result = runner.run(
            &Invocation::new("/nonexistent/dispwin.exe"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[test]
    fn test_capture_combines_stdout_and_stderr() {
        let runner = SystemProcessRunner;
        let output = runner
            .capture(&sh("echo listing; echo ' 1 = x' >&2; exit 1"), Duration::from_secs(5))
            .unwrap();
        assert!(output.starts_with("listing"));
        assert!(output.contains(" 1 = x"));
    }

    #[test]
    fn test_working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemProcessRunner;
        let output = runner
            .capture(&sh("pwd").current_dir(dir.path()), Duration::from_secs(5))
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let reported = std::path::PathBuf::from(output.trim()).canonicalize().unwrap();
        assert_eq!(reported, expected);
    }
}
