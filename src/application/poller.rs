// Background polling worker
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::buffer::TelemetryBuffer;
use crate::application::ports::{
    CredentialSource, DownstreamForwarder, FetchError, PersistenceSink, TelemetrySource,
};
use crate::application::session::SessionManager;
use crate::domain::data_point::DataPoint;
use crate::infrastructure::config::PollerSettings;

// How long shutdown waits for the worker before giving up. The worker is
// never force-killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Single worker that drives the whole pipeline: session upkeep, fetch,
/// buffer, persistence and forwarding. One cycle per tick; cycles never
/// overlap and no failure inside a cycle stops the loop.
pub struct PollingEngine {
    session: SessionManager,
    credentials: Arc<dyn CredentialSource>,
    source: Arc<dyn TelemetrySource>,
    sink: Arc<dyn PersistenceSink>,
    forwarder: Arc<dyn DownstreamForwarder>,
    buffer: TelemetryBuffer,
    settings: PollerSettings,
}

impl PollingEngine {
    pub fn new(
        session: SessionManager,
        credentials: Arc<dyn CredentialSource>,
        source: Arc<dyn TelemetrySource>,
        sink: Arc<dyn PersistenceSink>,
        forwarder: Arc<dyn DownstreamForwarder>,
        buffer: TelemetryBuffer,
        settings: PollerSettings,
    ) -> Self {
        Self {
            session,
            credentials,
            source,
            sink,
            forwarder,
            buffer,
            settings,
        }
    }

    /// Spawns the worker task. The returned handle stops it cooperatively.
    pub fn spawn(mut self) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(self.settings.interval_secs);
            let mut cycle: u64 = 0;
            info!(interval_secs = self.settings.interval_secs, "polling worker started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                cycle += 1;
                if let Err(err) = self.run_cycle().await {
                    warn!(cycle, "polling cycle failed: {err:#}");
                }
                if cycle % self.settings.prune_every == 0 {
                    self.buffer.prune(self.settings.retention_secs);
                    debug!(cycle, points = self.buffer.len(), "pruned telemetry buffer");
                }
            }
            info!("polling worker stopped");
        });
        PollerHandle {
            stop: stop_tx,
            handle,
        }
    }

    async fn run_cycle(&mut self) -> anyhow::Result<()> {
        self.session.ensure_valid(self.credentials.as_ref()).await;
        if !self.session.is_valid() {
            anyhow::bail!("no usable session, skipping cycle");
        }

        let point = self.fetch_with_retry().await?;
        self.buffer.append(point.clone());

        // A persistence failure must not cost us the forward.
        if let Err(err) = self.sink.append(&point).await {
            warn!("failed to persist data point: {err:#}");
        }

        match self
            .forwarder
            .forward(&point, self.session.credential())
            .await
        {
            Ok(()) => {}
            Err(FetchError::Unauthorized) => {
                warn!("collector rejected the session");
                self.session.mark_rejected();
            }
            Err(err) => warn!("failed to forward data point: {err}"),
        }
        Ok(())
    }

    // One retry after a 401, never more within the same cycle.
    async fn fetch_with_retry(&mut self) -> anyhow::Result<DataPoint> {
        match self.source.fetch_current(self.session.credential()).await {
            Ok(point) => Ok(point),
            Err(FetchError::Unauthorized) => {
                self.session.mark_rejected();
                self.session.ensure_valid(self.credentials.as_ref()).await;
                if !self.session.is_valid() {
                    anyhow::bail!("re-authentication failed after 401");
                }
                match self.source.fetch_current(self.session.credential()).await {
                    Ok(point) => Ok(point),
                    Err(FetchError::Unauthorized) => {
                        self.session.mark_rejected();
                        anyhow::bail!("session rejected twice in one cycle");
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub struct PollerHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Requests a stop and waits a bounded time for the worker to wind down.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if tokio::time::timeout(SHUTDOWN_GRACE, self.handle).await.is_err() {
            warn!("polling worker did not stop in time");
        }
    }
}
