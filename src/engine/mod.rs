//! # UCI engine driver
//!
//! Spawns and supervises a single engine child process. Three
//! cooperative tasks share no mutable state beyond an atomic `ready`
//! flag and a mutex-guarded log sink, all torn down together through one
//! [`CancellationToken`]:
//!
//! - the **writer** drains the command channel and writes one line per
//!   command to the child's stdin, gating on `ready`;
//! - the **reader** scans the child's stdout line by line and forwards
//!   every line to the output channel, flipping `ready` on `readyok`;
//! - the **error logger** mirrors the child's stderr to the host log.
//!
//! The driver itself never inspects engine output beyond the readiness
//! handshake — decoding `info` lines into [`info::EvaluationLine`]s and
//! deciding when an analysis is done is the analysis controller's job.

pub mod info;

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rootcause::Report;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::CoreError;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);
const COMMAND_CHANNEL_CAPACITY: usize = 64;
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// A running engine child process and the channel endpoints its tasks
/// expose. The driver never hands out the raw process handles — callers
/// only see `send` and `recv_line`.
pub struct EngineDriver {
    child: Child,
    cmd_tx: mpsc::Sender<String>,
    line_rx: mpsc::Receiver<String>,
    ready: Arc<AtomicBool>,
    cancel: CancellationToken,
    log: Arc<Mutex<Vec<String>>>,
}

impl EngineDriver {
    /// Spawn the engine binary and drive it through the full startup
    /// handshake: `uci` → drain to `uciok` → apply options → `isready` →
    /// `readyok` → `ucinewgame` → `isready` → `readyok`. Only after this
    /// returns is the driver usable for analysis.
    pub async fn spawn(config: &EngineConfig) -> Result<Self, Report> {
        let mut command = Command::new(&config.engine_binary);
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &config.engine_working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            Report::<CoreError>::from(CoreError::EngineSpawnFailure {
                binary: config.engine_binary.clone(),
                reason: e.to_string(),
            })
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Report::<CoreError>::from(CoreError::EngineSpawnFailure {
                binary: config.engine_binary.clone(),
                reason: "stdin was not piped".to_string(),
            })
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Report::<CoreError>::from(CoreError::EngineSpawnFailure {
                binary: config.engine_binary.clone(),
                reason: "stdout was not piped".to_string(),
            })
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            Report::<CoreError>::from(CoreError::EngineSpawnFailure {
                binary: config.engine_binary.clone(),
                reason: "stderr was not piped".to_string(),
            })
        })?;

        let ready = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        tokio::spawn(writer_task(stdin, cmd_rx, ready.clone(), cancel.clone()));
        tokio::spawn(reader_task(stdout, line_tx, ready.clone(), log.clone(), cancel.clone()));
        tokio::spawn(error_logger_task(stderr, log.clone(), cancel.clone()));

        let mut driver = Self {
            child,
            cmd_tx,
            line_rx,
            ready,
            cancel,
            log,
        };

        driver.handshake(config).await?;
        Ok(driver)
    }

    async fn handshake(&mut self, config: &EngineConfig) -> Result<(), Report> {
        self.send("uci").await?;
        self.drain_until(|line| line == "uciok").await?;

        for option in config.option_commands() {
            self.send(&option).await?;
        }

        self.send("isready").await?;
        self.drain_until(|line| line == "readyok").await?;

        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.drain_until(|line| line == "readyok").await?;

        Ok(())
    }

    /// Enqueue a command for the writer task.
    pub async fn send(&self, command: &str) -> Result<(), Report> {
        self.cmd_tx
            .send(command.to_string())
            .await
            .map_err(|_| Report::from(CoreError::Cancelled))
    }

    /// Receive the next raw line from the engine, or `None` once the
    /// reader task has shut down (cancellation or the child exited).
    pub async fn recv_line(&mut self) -> Option<String> {
        self.line_rx.recv().await
    }

    async fn drain_until(&mut self, done: impl Fn(&str) -> bool) -> Result<(), Report> {
        loop {
            let Some(line) = self.recv_line().await else {
                return Err(Report::from(CoreError::EngineProtocolViolation {
                    raw_line: String::new(),
                    reason: "engine stdout closed before handshake completed".to_string(),
                }));
            };
            if done(&line) {
                return Ok(());
            }
        }
    }

    /// The lines mirrored to the host log so far (noisy `currmove` lines
    /// excluded), for diagnostics.
    pub async fn mirrored_log(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    /// Cancel all driver tasks, send `quit`, and await the child.
    pub async fn shutdown(mut self) -> Result<(), Report> {
        let _ = self.send("quit").await;
        self.cancel.cancel();
        // A kill racing the cancellation is tolerated, not fatal.
        let _ = self.child.wait().await;
        Ok(())
    }
}

async fn writer_task(
    mut stdin: ChildStdin,
    mut cmd_rx: mpsc::Receiver<String>,
    ready: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => return,
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => return,
            },
        };

        loop {
            if ready.load(Ordering::Acquire) {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }

        if command == "isready" {
            ready.store(false, Ordering::Release);
        }

        if stdin.write_all(format!("{command}\n").as_bytes()).await.is_err() {
            return;
        }
        if stdin.flush().await.is_err() {
            return;
        }
    }
}

async fn reader_task(
    stdout: tokio::process::ChildStdout,
    line_tx: mpsc::Sender<String>,
    ready: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match next {
            Ok(Some(line)) => {
                if line.trim() == "readyok" {
                    ready.store(true, Ordering::Release);
                }
                if !info::is_noisy_currmove_line(&line) {
                    tracing::debug!(target: "engine::stdout", "{line}");
                    log.lock().await.push(line.clone());
                }
                if line_tx.send(line).await.is_err() {
                    return;
                }
            }
            _ => return,
        }
    }
}

async fn error_logger_task(
    stderr: tokio::process::ChildStderr,
    log: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match next {
            Ok(Some(line)) => {
                tracing::warn!(target: "engine::stderr", "{line}");
                log.lock().await.push(line);
            }
            _ => return,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// A `/bin/sh` stand-in UCI engine: answers `uci`/`isready` and, on
    /// `go`, emits one depth-1 info line plus `bestmove` for it. Good
    /// enough to drive the handshake and a single analysis round without
    /// a real engine binary in the test environment.
    pub fn stub_engine_script() -> PathBuf {
        let path = std::env::temp_dir().join(format!("depthbook-stub-engine-{}.sh", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("create stub engine script");
        writeln!(
            file,
            "#!/bin/sh\nwhile IFS= read -r line; do\n  case \"$line\" in\n    uci) echo uciok ;;\n    isready*) echo readyok ;;\n    go*) echo 'info depth 1 seldepth 1 multipv 1 score cp 10 nodes 20 nps 1000 time 5 pv e2e4'; echo 'bestmove e2e4' ;;\n  esac\ndone"
        )
        .expect("write stub engine script");
        let mut perms = std::fs::metadata(&path).expect("stat stub engine script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod stub engine script");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::stub_engine_script;
    use super::*;

    #[tokio::test]
    async fn spawn_completes_the_startup_handshake_against_a_stub_engine() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let script = stub_engine_script();
        let config = EngineConfig {
            engine_binary: script.to_string_lossy().to_string(),
            ..EngineConfig::default()
        };

        let driver = EngineDriver::spawn(&config).await.expect("handshake should succeed");
        driver.shutdown().await.expect("shutdown should succeed");
        let _ = std::fs::remove_file(&script);
    }
}
