use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::error::{FeedError, RecordError};
use super::parsing::parse_line;
use super::schema::FeedSchema;
use super::sink::ObservationSink;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// What the replay loop does with a line it cannot decode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OnMalformed {
    /// Report the record and carry on with the next line.
    #[default]
    Skip,
    /// Report the record and end the replay.
    Stop,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source: PathBuf,
    pub schema: FeedSchema,
    pub delay: Duration,
    pub on_malformed: OnMalformed,
}

impl FeedConfig {
    /// Vessel-report feed over `source`, correlated on `entity_id_field`.
    pub fn new(source: impl Into<PathBuf>, entity_id_field: &str, delay: Duration) -> Self {
        Self {
            source: source.into(),
            schema: FeedSchema::ais_vessels(entity_id_field),
            delay,
            on_malformed: OnMalformed::default(),
        }
    }

    pub fn with_on_malformed(mut self, on_malformed: OnMalformed) -> Self {
        self.on_malformed = on_malformed;
        self
    }
}

/// Lifecycle of a feed. Anything past `Connected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    Connected,
    /// The source ran out of records.
    Finished,
    Disconnected,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub emitted: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub status: FeedStatus,
    pub stats: FeedStats,
}

#[derive(Debug)]
struct Shared {
    status: FeedStatus,
    stats: FeedStats,
}

#[derive(Debug, Default)]
struct StopSignal {
    raised: AtomicBool,
    wake: Notify,
}

impl StopSignal {
    fn raise(&self) {
        self.raised.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Replays a line-delimited observation file as a paced live feed.
pub struct SimulatedFeed {
    config: Arc<FeedConfig>,
    shared: Arc<Mutex<Shared>>,
    stop: Arc<StopSignal>,
    worker: Option<JoinHandle<Result<ReplaySummary, FeedError>>>,
}

impl SimulatedFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config: Arc::new(config),
            shared: Arc::new(Mutex::new(Shared {
                status: FeedStatus::Idle,
                stats: FeedStats::default(),
            })),
            stop: Arc::new(StopSignal::default()),
            worker: None,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Schema of the observations this feed emits. Never touches the source.
    pub fn describe(&self) -> FeedSchema {
        self.config.schema.clone()
    }

    pub fn status(&self) -> FeedStatus {
        lock(&self.shared).status
    }

    pub fn stats(&self) -> FeedStats {
        lock(&self.shared).stats
    }

    /// Open the source and start replaying it into `sink` on a background task.
    ///
    /// Returns as soon as the task is spawned. A feed connects at most once.
    pub async fn connect<S: ObservationSink>(&mut self, sink: S) -> Result<(), FeedError> {
        match self.status() {
            FeedStatus::Idle => {}
            FeedStatus::Connected => return Err(FeedError::AlreadyConnected),
            _ => return Err(FeedError::Closed),
        }

        let path = self.config.source.display().to_string();
        let file = match File::open(&self.config.source).await {
            Ok(file) => file,
            Err(source) => {
                error!("Failed to open observation source {}: {}", path, source);
                lock(&self.shared).status = FeedStatus::Failed;
                sink.status_changed(FeedStatus::Failed);
                return Err(FeedError::Open { path, source });
            }
        };

        lock(&self.shared).status = FeedStatus::Connected;
        sink.status_changed(FeedStatus::Connected);
        info!(
            "Replaying {} every {}",
            path,
            humantime::format_duration(self.config.delay)
        );

        let config = self.config.clone();
        let shared = self.shared.clone();
        let stop = self.stop.clone();
        self.worker = Some(tokio::spawn(async move {
            let result = run_replay_loop(file, &config, &shared, &stop, &sink).await;

            let status = match &result {
                Ok(status) => *status,
                Err(_) => FeedStatus::Failed,
            };
            let stats = {
                let mut locked = lock(&shared);
                locked.status = status;
                locked.stats
            };
            sink.status_changed(status);
            info!(
                "Replay of {} ended ({}): {} emitted, {} skipped",
                config.source.display(),
                status,
                stats.emitted,
                stats.skipped
            );

            result.map(|status| ReplaySummary { status, stats })
        }));

        Ok(())
    }

    /// Ask the replay loop to stop. Returns without waiting for it.
    pub fn disconnect(&self) {
        if self.status() == FeedStatus::Connected && !self.stop.is_raised() {
            debug!("Disconnect requested for {}", self.config.source.display());
            self.stop.raise();
        }
    }

    /// Wait for the replay loop to end. `None` if it was never started or
    /// has already been waited on.
    pub async fn wait(&mut self) -> Option<Result<ReplaySummary, FeedError>> {
        let join = self.worker.as_mut()?;
        let result = join.await;
        self.worker = None;
        Some(match result {
            Ok(result) => result,
            Err(e) => {
                lock(&self.shared).status = FeedStatus::Failed;
                Err(FeedError::Task(e.to_string()))
            }
        })
    }
}

impl Drop for SimulatedFeed {
    fn drop(&mut self) {
        self.stop.raise();
    }
}

async fn run_replay_loop<S: ObservationSink>(
    file: File,
    config: &FeedConfig,
    shared: &Mutex<Shared>,
    stop: &StopSignal,
    sink: &S,
) -> Result<FeedStatus, FeedError> {
    let entity_id_field = config.schema.entity_id_field.as_str();
    let mut lines = BufReader::new(file).split(b'\n');
    let mut line_number = 0;

    loop {
        if stop.is_raised() {
            return Ok(FeedStatus::Disconnected);
        }

        let Some(bytes) = lines.next_segment().await? else {
            return Ok(FeedStatus::Finished);
        };
        line_number += 1;

        let observation = match parse_line(&bytes, config.schema.spatial_reference) {
            Ok(Some(observation)) => observation,
            Ok(None) => continue,
            Err(error) => {
                let error = RecordError {
                    line: line_number,
                    error,
                };
                lock(shared).stats.skipped += 1;
                sink.record_rejected(error.clone());
                match config.on_malformed {
                    OnMalformed::Skip => {
                        warn!("Skipping malformed record, {}", error);
                        continue;
                    }
                    OnMalformed::Stop => {
                        error!("Stopping replay on malformed record, {}", error);
                        return Err(FeedError::Malformed(error));
                    }
                }
            }
        };

        if stop.is_raised() {
            return Ok(FeedStatus::Disconnected);
        }
        if observation.entity_id(entity_id_field).is_none() {
            debug!("Line {} has no {} value", line_number, entity_id_field);
        }
        lock(shared).stats.emitted += 1;
        sink.observe(observation);

        if config.delay.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }
        let should_stop = tokio::select! {
            _ = sleep(config.delay) => false,
            _ = stop.wake.notified() => true,
        };
        if should_stop {
            return Ok(FeedStatus::Disconnected);
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
