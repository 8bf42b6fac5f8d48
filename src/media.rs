use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// How a dispatched clip finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClipEvent {
    Ended,
    Error(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("playback start rejected: {0}")]
    StartRejected(String),
    #[error("no source loaded")]
    NoSource,
}

/// Completion side of one dispatched clip. Whichever of ended/error fires
/// first resolves it; a dropped sender counts as an error.
#[derive(Debug)]
pub struct ClipEvents {
    rx: oneshot::Receiver<ClipEvent>,
}

/// Producer side handed to whatever drives the clip.
#[derive(Debug)]
pub struct ClipSignal {
    tx: oneshot::Sender<ClipEvent>,
}

impl ClipEvents {
    pub fn channel() -> (ClipSignal, ClipEvents) {
        let (tx, rx) = oneshot::channel();
        (ClipSignal { tx }, ClipEvents { rx })
    }

    pub async fn recv(&mut self) -> ClipEvent {
        match (&mut self.rx).await {
            Ok(event) => event,
            Err(_) => ClipEvent::Error("clip released before completing".to_string()),
        }
    }
}

impl ClipSignal {
    pub fn ended(self) {
        let _ = self.tx.send(ClipEvent::Ended);
    }

    pub fn failed(self, reason: impl Into<String>) {
        let _ = self.tx.send(ClipEvent::Error(reason.into()));
    }
}

/// Capability that decodes and shows one clip at a time.
pub trait MediaPlayer: Send + 'static {
    fn set_playback_rate(&mut self, rate: f32);
    fn set_source(&mut self, src: &str);
    /// Start the current source. `Err` means playback never began.
    fn play(&mut self) -> Result<ClipEvents, MediaError>;
    fn pause(&mut self);
    /// Stop and release the current source.
    fn stop(&mut self);
}

/// Headless player: a clip "plays" for a nominal duration if its asset exists
/// under `asset_root`, and fails with an error event otherwise.
pub struct SimulatedPlayer {
    asset_root: PathBuf,
    clip_duration: Duration,
    rate: f32,
    source: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedPlayer {
    pub fn new(asset_root: impl Into<PathBuf>, clip_duration: Duration) -> Self {
        Self {
            asset_root: asset_root.into(),
            clip_duration,
            rate: 1.0,
            source: None,
            task: None,
        }
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let relative = src.trim_start_matches("./");
        self.asset_root.join(Path::new(relative))
    }

    // Rates that would overflow the clip length fall back to the nominal one.
    fn scaled_duration(&self) -> Duration {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return self.clip_duration;
        }
        Duration::try_from_secs_f32(self.clip_duration.as_secs_f32() / self.rate)
            .unwrap_or(self.clip_duration)
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn set_playback_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    fn set_source(&mut self, src: &str) {
        self.cancel_task();
        self.source = Some(src.to_string());
    }

    fn play(&mut self) -> Result<ClipEvents, MediaError> {
        let src = self.source.as_deref().ok_or(MediaError::NoSource)?;
        let path = self.resolve(src);
        let (signal, events) = ClipEvents::channel();
        if !path.is_file() {
            signal.failed(format!("missing asset {}", path.display()));
            return Ok(events);
        }

        let duration = self.scaled_duration();
        debug!("simulating {} for {} ms", path.display(), duration.as_millis());
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            signal.ended();
        }));
        Ok(events)
    }

    fn pause(&mut self) {
        self.cancel_task();
    }

    fn stop(&mut self) {
        self.cancel_task();
        self.source = None;
    }
}
