use std::io::ErrorKind;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::{TilewireError, TilewireResult};

/// Scoped guard over a spawned renderer process.
///
/// Owns the child for its whole lifetime and guarantees it is killed and
/// reaped on every exit path from the streaming loop, including early return
/// and panic. Argument construction stays with the caller; this type only
/// owns the lifecycle and the stdout pipe handoff.
pub struct RendererProcess {
    child: Child,
    terminated: bool,
}

impl RendererProcess {
    /// Spawns `command` with its stdout piped and hands the pipe to the
    /// caller for decoding.
    pub fn spawn(mut command: Command) -> TilewireResult<(Self, ChildStdout)> {
        command.stdout(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| TilewireError::process(format!("failed to spawn renderer: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TilewireError::process(
                "renderer stdout pipe was not captured",
            ));
        };

        Ok((
            Self {
                child,
                terminated: false,
            },
            stdout,
        ))
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kills the child if it is still running and reaps it. Idempotent; the
    /// child may have exited on its own already.
    pub fn terminate(&mut self) -> TilewireResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        match self.child.kill() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(e) => {
                return Err(TilewireError::process(format!(
                    "failed to kill renderer: {e}"
                )));
            }
        }
        self.child
            .wait()
            .map_err(|e| TilewireError::process(format!("failed to reap renderer: {e}")))?;
        Ok(())
    }
}

impl Drop for RendererProcess {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            tracing::warn!(%err, "renderer process cleanup failed");
        }
    }
}
