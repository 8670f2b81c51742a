//! Runs a service's long-lived processes side by side and tears them down together.
//!
//! Every process shares one `CancellationToken`. It is cancelled on SIGINT,
//! SIGTERM, or as soon as any process fails. Closers run once all processes
//! have stopped, bounded by a timeout.
//!
//! ```no_run
//! use fleet_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| {
//!             Box::pin(async move {
//!                 ctx.cancelled().await;
//!                 Ok(())
//!             })
//!         })
//!         .with_closer(|| Box::pin(async { Ok(()) }))
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type ProcessFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running process; it must return once the token is cancelled
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;

/// Cleanup run after every process has stopped
pub type Closer = Box<dyn FnOnce() -> ProcessFuture + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

/// Why the runner stopped
#[derive(Debug)]
pub enum RunOutcome {
    /// Shutdown was requested, or every process returned cleanly
    Stopped,
    /// A process failed or panicked
    Failed { process: String, error: anyhow::Error },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    pub fn with_named_process<F>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> ProcessFuture + Send + 'static,
    {
        self.processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(process),
        });
        self
    }

    /// Closers run concurrently; one failing does not stop the others
    pub fn with_closer<F>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> ProcessFuture + Send + 'static,
    {
        self.closers.push(Box::new(closer));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Share an externally owned token, e.g. to stop the runner from a test
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Skip installing SIGINT/SIGTERM handlers
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Run to completion and exit the process with the outcome's code
    pub async fn run(self) {
        let outcome = self.run_until_stopped().await;
        match &outcome {
            RunOutcome::Stopped => info!("Application exiting normally"),
            RunOutcome::Failed { process, error } => {
                error!(process = %process, "Application exiting with error: {:#}", error)
            }
        }
        std::process::exit(outcome.exit_code());
    }

    /// Run every process until shutdown or the first failure, then run closers
    pub async fn run_until_stopped(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                debug!(process = %name, "starting process");
                let result = process(process_token).await;
                (name, result)
            });
        }

        if self.handle_signals {
            let signal_token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = wait_for_signal() => signal_token.cancel(),
                    _ = signal_token.cancelled() => {}
                }
            });
        }

        let mut outcome = RunOutcome::Stopped;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => debug!(process = %name, "process completed"),
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, "process failed: {:#}", err);
                        outcome = RunOutcome::Failed {
                            process: name,
                            error: err,
                        };
                        token.cancel();
                    } else {
                        warn!(process = %name, "process returned error during shutdown: {:#}", err);
                    }
                }
                Err(join_err) => {
                    error!("process panicked: {}", join_err);
                    if !token.is_cancelled() {
                        outcome = RunOutcome::Failed {
                            process: "unknown".to_string(),
                            error: anyhow::anyhow!("process panicked: {}", join_err),
                        };
                        token.cancel();
                    }
                }
            }
        }

        if !self.closers.is_empty() {
            info!("Running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => info!("All closers completed"),
                Err(_) => error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        outcome
    }
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("Closer completed successfully"),
            Ok(Err(err)) => error!("Closer error: {:#}", err),
            Err(err) => error!("Closer panicked: {}", err),
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received SIGINT");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn wait_for_cancel() -> impl FnOnce(CancellationToken) -> ProcessFuture {
        |ctx: CancellationToken| -> ProcessFuture {
            Box::pin(async move {
                ctx.cancelled().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_external_cancel_stops_all_processes_and_runs_closers() {
        let token = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();

        let runner = Runner::new()
            .without_signal_handlers()
            .with_cancellation_token(token.clone())
            .with_named_process("a", wait_for_cancel())
            .with_named_process("b", wait_for_cancel())
            .with_closer(move || {
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
            });

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = runner.run_until_stopped().await;
        assert!(matches!(outcome, RunOutcome::Stopped));
        assert_eq!(outcome.exit_code(), 0);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_siblings() {
        let sibling_stopped = Arc::new(AtomicBool::new(false));
        let flag = sibling_stopped.clone();

        let outcome = Runner::new()
            .without_signal_handlers()
            .with_named_process("broken", |_ctx| {
                Box::pin(async { Err(anyhow::anyhow!("bind failed")) })
            })
            .with_named_process("healthy", move |ctx| {
                Box::pin(async move {
                    ctx.cancelled().await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
            .run_until_stopped()
            .await;

        match outcome {
            RunOutcome::Failed { process, error } => {
                assert_eq!(process, "broken");
                assert!(error.to_string().contains("bind failed"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(sibling_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_closer_does_not_block_others() {
        let ran = Arc::new(AtomicUsize::new(0));
        let first = ran.clone();
        let second = ran.clone();

        let outcome = Runner::new()
            .without_signal_handlers()
            .with_closer(move || {
                Box::pin(async move {
                    first.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("flush failed"))
                })
            })
            .with_closer(move || {
                Box::pin(async move {
                    second.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .run_until_stopped()
            .await;

        assert!(matches!(outcome, RunOutcome::Stopped));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_closer_is_abandoned_after_timeout() {
        let outcome = Runner::new()
            .without_signal_handlers()
            .with_closer(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                })
            })
            .with_closer_timeout(Duration::from_secs(1))
            .run_until_stopped()
            .await;

        assert!(matches!(outcome, RunOutcome::Stopped));
    }
}
