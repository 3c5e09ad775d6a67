//! Inbound bridge adapter.
//!
//! Spawns the bridge program (which holds the user-account session) and
//! reads its NDJSON event stream from stdout.

pub mod media;
pub mod wire;

use std::{collections::VecDeque, path::PathBuf, process::Stdio, sync::Arc};

use tgwatch_core::{errors::Error, protocol::InboundEvent, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use media::LocalOrHttpMediaSource;

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct BridgeProcess {
    cfg: BridgeConfig,
}

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            let Some(front) = self.lines.pop_front() else {
                break;
            };
            self.bytes = self.bytes.saturating_sub(front.len() + 1);
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl BridgeProcess {
    pub fn new(cfg: BridgeConfig) -> Self {
        Self { cfg }
    }

    /// Run the bridge until its stdout closes or `cancel` fires.
    ///
    /// Undecodable lines are skipped. An error from `on_event` stops the
    /// bridge and is returned.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        on_event: &mut (dyn FnMut(InboundEvent) -> Result<()> + Send),
    ) -> Result<()> {
        let mut child = Command::new(&self.cfg.program)
            .args(&self.cfg.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        info!(
            program = %self.cfg.program.display(),
            pid = ?child.id(),
            "bridge process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External("bridge stdout was not captured".to_string()))?;

        // Drain stderr in background to avoid blocking on a full pipe.
        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));
        let drain = child.stderr.take().map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            })
        });

        let mut reader = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
              _ = cancel.cancelled() => {
                kill_child(&mut child).await?;
                info!("bridge process stopped");
                return Ok(());
              }
              line = reader.next_line() => {
                let line = match line {
                  Ok(v) => v,
                  Err(e) => {
                    if let Err(kill_e) = kill_child(&mut child).await {
                      return Err(Error::External(format!("bridge stdout read failed: {e} (also failed to kill bridge process: {kill_e})")));
                    }
                    return Err(Error::Io(e));
                  }
                };
                let Some(line) = line else { break; };

                match wire::decode_line(&line) {
                  Ok(Some(event)) => {
                    if let Err(e) = on_event(event) {
                      if let Err(kill_e) = kill_child(&mut child).await {
                        return Err(Error::External(format!("{e} (also failed to kill bridge process: {kill_e})")));
                      }
                      return Err(e);
                    }
                  }
                  Ok(None) => {}
                  Err(e) => {
                    debug!(line = %truncate_text(&line, 200), "skipping undecodable bridge line: {e}");
                  }
                }
              }
            }
        }

        let status = child.wait().await?;
        info!(%status, "bridge process exited");
        if status.success() {
            return Ok(());
        }

        if let Some(drain) = drain {
            let _ = drain.await;
        }
        let stderr = stderr_tail.lock().await.snapshot();
        if !stderr.trim().is_empty() {
            return Err(Error::External(format!(
                "bridge exited with status {status}\nstderr (tail):\n{stderr}"
            )));
        }
        Err(Error::External(format!(
            "bridge exited with status {status}"
        )))
    }
}

async fn kill_child(child: &mut Child) -> Result<()> {
    // If it's already exited, `try_wait` reaps it.
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    if let Err(e) = child.kill().await {
        // If it exited between `try_wait` and `kill`, treat it as reaped.
        if child.try_wait()?.is_none() {
            return Err(Error::Io(e));
        }
    }
    Ok(())
}

fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tgwatch_core::{
        domain::{MessageId, MessageScope},
        protocol::Notification,
    };

    fn shell(script: &str) -> BridgeProcess {
        BridgeProcess::new(BridgeConfig {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
        })
    }

    #[tokio::test]
    async fn forwards_decoded_events_and_skips_noise() {
        let bridge = shell(
            r#"echo '{"type":"delete_messages","messages":[1]}'
echo 'garbage'
echo '{"type":"typing"}'
echo '{"type":"archived_peers","peers":[5]}'"#,
        );

        let mut seen = Vec::new();
        bridge
            .run(CancellationToken::new(), &mut |ev| {
                seen.push(ev);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                InboundEvent::Notification(Notification::Deletion {
                    scope: MessageScope::Account,
                    ids: vec![MessageId(1)],
                }),
                InboundEvent::ArchivedPeers(vec![5]),
            ]
        );
    }

    #[tokio::test]
    async fn abnormal_exit_reports_stderr_tail() {
        let err = shell("echo 'session expired' >&2; exit 3")
            .run(CancellationToken::new(), &mut |_| Ok(()))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bridge exited"), "{msg}");
        assert!(msg.contains("session expired"), "{msg}");
    }

    #[tokio::test]
    async fn cancellation_kills_a_silent_bridge() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            shell("sleep 30").run(cancel, &mut |_| Ok(())),
        )
        .await
        .expect("bridge did not stop");
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn handler_errors_stop_the_bridge() {
        let err = shell(r#"while true; do echo '{"type":"delete_messages","messages":[2]}'; sleep 0.01; done"#)
            .run(CancellationToken::new(), &mut |_| {
                Err(Error::External("handler gave up".to_string()))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("handler gave up"));
    }

    #[test]
    fn stderr_tail_keeps_most_recent_lines() {
        let mut tail = StderrTail::default();
        for i in 0..(STDERR_TAIL_MAX_LINES + 10) {
            tail.push_line(format!("line {i}"));
        }
        assert_eq!(tail.lines.len(), STDERR_TAIL_MAX_LINES);
        assert!(tail.snapshot().starts_with("line 10\n"));
    }
}
