use std::path::{Path, PathBuf};
use std::sync::Arc;

use sign_lexicon::{DictionaryIndex, load_dictionary};
use sign_segment::MatchEngine;
use sign_types::{MatchMode, QueueItem};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::playback::{PlaybackHandle, Snapshot, Status};

pub const MAX_SPEED: f32 = 4.0;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("speed must be a finite number in (0, {MAX_SPEED}], got {0}")]
    InvalidSpeed(f32),
}

struct SessionState {
    text: String,
    mode: MatchMode,
    engine: MatchEngine,
}

/// Command surface: text and mode in, queue out to the playback controller.
///
/// Every text or mode change rebuilds the queue wholesale; the controller
/// stops an active loop before installing it.
pub struct Session {
    state: Mutex<SessionState>,
    playback: PlaybackHandle,
    dictionary_path: PathBuf,
}

impl Session {
    pub fn new(playback: PlaybackHandle, dictionary_path: impl Into<PathBuf>) -> Self {
        Self::with_engine(playback, dictionary_path, MatchEngine::default())
    }

    pub fn with_engine(
        playback: PlaybackHandle,
        dictionary_path: impl Into<PathBuf>,
        engine: MatchEngine,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                text: String::new(),
                mode: MatchMode::default(),
                engine,
            }),
            playback,
            dictionary_path: dictionary_path.into(),
        }
    }

    pub fn dictionary_path(&self) -> &Path {
        &self.dictionary_path
    }

    pub async fn set_text(&self, text: impl Into<String>) -> Snapshot {
        let mut state = self.state.lock().await;
        state.text = text.into();
        self.rebuild(&state).await
    }

    pub async fn set_mode(&self, mode: MatchMode) -> Snapshot {
        let mut state = self.state.lock().await;
        state.mode = mode;
        self.rebuild(&state).await
    }

    pub async fn mode(&self) -> MatchMode {
        self.state.lock().await.mode
    }

    pub async fn set_speed(&self, rate: f32) -> Result<Snapshot, SessionError> {
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_SPEED {
            return Err(SessionError::InvalidSpeed(rate));
        }
        Ok(self.playback.set_speed(rate).await)
    }

    pub async fn set_idle_loop(&self, enabled: bool) -> Snapshot {
        self.playback.set_idle_loop(enabled).await
    }

    /// Read the dictionary once. A failure leaves an empty index in place, so
    /// everything is fingerspelled.
    pub async fn load_dictionary(&self) -> Snapshot {
        let mut state = self.state.lock().await;
        self.playback.announce(Status::Loading).await;

        let path = self.dictionary_path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_dictionary(path))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);

        let status = match loaded {
            Ok(dict) => {
                state
                    .engine
                    .replace_index(DictionaryIndex::build_shared(&dict));
                Status::DictionaryLoaded
            }
            Err(err) => {
                warn!("dictionary unavailable, falling back to fingerspelling: {err:#}");
                state.engine.replace_index(Arc::new(DictionaryIndex::empty()));
                Status::DictionaryMissing
            }
        };
        self.rebuild(&state).await;
        self.playback.announce(status).await
    }

    /// Start or resume playback, building the queue first if there is none.
    pub async fn play(&self) -> Snapshot {
        let state = self.state.lock().await;
        if self.playback.snapshot().await.queue_len == 0 {
            self.rebuild(&state).await;
        }
        self.playback.play().await
    }

    pub async fn pause(&self) -> Snapshot {
        self.playback.pause().await
    }

    pub async fn stop(&self) -> Snapshot {
        self.playback.stop().await
    }

    pub async fn step_prev(&self) -> Snapshot {
        self.playback.step_prev().await
    }

    pub async fn step_next(&self) -> Snapshot {
        self.playback.step_next().await
    }

    pub async fn announce(&self, status: Status) -> Snapshot {
        self.playback.announce(status).await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.playback.snapshot().await
    }

    /// Segment `text` against the current dictionary without touching the
    /// installed queue.
    pub async fn preview(&self, text: &str, mode: Option<MatchMode>) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        state.engine.segment_text(text, mode.unwrap_or(state.mode))
    }

    async fn rebuild(&self, state: &SessionState) -> Snapshot {
        let queue = state.engine.segment_text(&state.text, state.mode);
        debug!(
            "rebuilt queue: {} items from {} chars ({})",
            queue.len(),
            state.text.len(),
            state.mode
        );
        self.playback.replace_queue(queue).await
    }
}
