use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::{EngineError, Result};

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Both output pipes are drained on helper threads so a chatty child cannot
/// stall on a full pipe while we wait.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ProcessOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("running {program} (timeout {}s)", timeout.as_secs());

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            warn!("{program} exceeded {}s, killing it", timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Timeout {
                program,
                secs: timeout.as_secs(),
            });
        }
    };

    Ok(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
