use std::{
    process::Stdio,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use serde::Serialize;
use tokio::{process, sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use aircon_common::{Command, IrSendConfig, Transmitter};

const IRSEND_DIRECTIVE: &str = "SEND_ONCE";

#[derive(Debug, Default)]
struct IrStats {
    queued: u64,
    sent_frames: u64,
    failed_sends: u64,
    last_send_ms: Option<u64>,
    last_command: Option<String>,
    last_error: Option<String>,
}

#[derive(Debug, Clone)]
enum IrBackend {
    Queue(mpsc::UnboundedSender<Command>),
    Disabled,
}

/// Hands commands to a single worker that shells out to LIRC `irsend`.
///
/// `transmit` only enqueues, so the controller never waits on the process. The
/// worker runs one `irsend` at a time and spaces sends by the configured
/// interval so frames never overlap on the emitter.
#[derive(Debug, Clone)]
pub struct IrSendTransmitter {
    backend: IrBackend,
    config: IrSendConfig,
    stats: Arc<Mutex<IrStats>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrDiagnostics {
    pub enabled: bool,
    pub program: String,
    pub device: String,
    #[serde(rename = "minSendIntervalMs")]
    pub min_send_interval_ms: u64,
    pub queued: u64,
    #[serde(rename = "sentFrames")]
    pub sent_frames: u64,
    #[serde(rename = "failedSends")]
    pub failed_sends: u64,
    #[serde(rename = "lastSendMs")]
    pub last_send_ms: Option<u64>,
    #[serde(rename = "lastCommand")]
    pub last_command: Option<String>,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

impl IrSendTransmitter {
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: IrSendConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(IrStats::default()));
        let worker = tokio::spawn(run_worker(config.clone(), rx, Arc::clone(&stats)));

        (
            Self {
                backend: IrBackend::Queue(tx),
                config,
                stats,
            },
            worker,
        )
    }

    pub fn disabled(config: IrSendConfig) -> Self {
        Self {
            backend: IrBackend::Disabled,
            config,
            stats: Arc::new(Mutex::new(IrStats::default())),
        }
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        let stats = lock_stats(&self.stats);
        IrDiagnostics {
            enabled: matches!(self.backend, IrBackend::Queue(_)),
            program: self.config.program.clone(),
            device: self.config.device.clone(),
            min_send_interval_ms: self.config.min_send_interval_ms,
            queued: stats.queued,
            sent_frames: stats.sent_frames,
            failed_sends: stats.failed_sends,
            last_send_ms: stats.last_send_ms,
            last_command: stats.last_command.clone(),
            last_error: stats.last_error.clone(),
        }
    }
}

impl Transmitter for IrSendTransmitter {
    fn transmit(&mut self, command: &Command) {
        match &self.backend {
            IrBackend::Queue(tx) => {
                let mut stats = lock_stats(&self.stats);
                if tx.send(command.clone()).is_ok() {
                    stats.queued = stats.queued.saturating_add(1);
                } else {
                    warn!("IR worker stopped, dropping command {command}");
                    stats.failed_sends = stats.failed_sends.saturating_add(1);
                    stats.last_error = Some("IR worker stopped".to_string());
                }
            }
            IrBackend::Disabled => {
                warn!("IR disabled, dropping command {command}");
            }
        }
    }
}

async fn run_worker(
    config: IrSendConfig,
    mut rx: mpsc::UnboundedReceiver<Command>,
    stats: Arc<Mutex<IrStats>>,
) {
    let min_interval = Duration::from_millis(config.min_send_interval_ms);
    let mut last_send: Option<Instant> = None;

    while let Some(command) = rx.recv().await {
        if let Some(last) = last_send {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }

        let result = send_once(&config, &command).await;
        last_send = Some(Instant::now());

        let mut stats = lock_stats(&stats);
        stats.last_send_ms = Some(monotonic_ms());
        stats.last_command = Some(command.to_string());
        match result {
            Ok(()) => {
                info!("sent IR command {command} to {}", config.device);
                stats.sent_frames = stats.sent_frames.saturating_add(1);
                stats.last_error = None;
            }
            Err(err) => {
                warn!("IR command {command} failed: {err:#}");
                stats.failed_sends = stats.failed_sends.saturating_add(1);
                stats.last_error = Some(format!("{err:#}"));
            }
        }
    }
}

async fn send_once(config: &IrSendConfig, command: &Command) -> anyhow::Result<()> {
    let status = process::Command::new(&config.program)
        .args(irsend_args(&config.device, command))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .await
        .with_context(|| format!("failed to run {}", config.program))?;

    if !status.success() {
        bail!("{} exited with {status}", config.program);
    }
    Ok(())
}

fn irsend_args<'a>(device: &'a str, command: &'a Command) -> [&'a str; 3] {
    [IRSEND_DIRECTIVE, device, command.as_str()]
}

fn lock_stats(stats: &Mutex<IrStats>) -> std::sync::MutexGuard<'_, IrStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use aircon_common::{CommandEncoder, TargetMode};

    use super::*;

    #[test]
    fn builds_send_once_arguments() {
        let command = CommandEncoder::default()
            .encode_setpoint(TargetMode::Heat, 23)
            .unwrap();

        assert_eq!(
            irsend_args("ac", &command),
            ["SEND_ONCE", "ac", "HEAT_23_MED"]
        );
    }

    #[test]
    fn disabled_backend_drops_commands() {
        let mut transmitter = IrSendTransmitter::disabled(IrSendConfig::default());
        transmitter.transmit(&CommandEncoder::default().encode_power_off());

        let diagnostics = transmitter.diagnostics();
        assert!(!diagnostics.enabled);
        assert_eq!(diagnostics.queued, 0);
        assert_eq!(diagnostics.sent_frames, 0);
    }

    #[tokio::test]
    async fn spawn_failure_is_recorded_not_raised() {
        let config = IrSendConfig {
            program: "/nonexistent/irsend".to_string(),
            device: "ac".to_string(),
            min_send_interval_ms: 0,
        };
        let (mut transmitter, _worker) = IrSendTransmitter::spawn(config);
        transmitter.transmit(&CommandEncoder::default().encode_power_off());

        let deadline = Instant::now() + Duration::from_secs(5);
        while transmitter.diagnostics().failed_sends == 0 {
            assert!(Instant::now() < deadline, "worker never reported the failure");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let diagnostics = transmitter.diagnostics();
        assert!(diagnostics.enabled);
        assert_eq!(diagnostics.queued, 1);
        assert_eq!(diagnostics.sent_frames, 0);
        assert_eq!(diagnostics.last_command.as_deref(), Some("OFF"));
        assert!(diagnostics
            .last_error
            .as_deref()
            .is_some_and(|err| err.contains("/nonexistent/irsend")));
    }

    #[tokio::test]
    async fn closed_worker_counts_as_failure() {
        let (mut transmitter, worker) = IrSendTransmitter::spawn(IrSendConfig::default());
        worker.abort();
        let _ = worker.await;

        transmitter.transmit(&CommandEncoder::default().encode_power_off());

        let diagnostics = transmitter.diagnostics();
        assert_eq!(diagnostics.failed_sends, 1);
        assert_eq!(diagnostics.last_error.as_deref(), Some("IR worker stopped"));
    }
}
