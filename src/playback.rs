//! Sequential playback of a clip queue.
//!
//! A single controller task owns the queue, the position and the media
//! player. Commands reach it through [`PlaybackHandle`] and are answered with
//! a [`Snapshot`]. While an item is in flight (a clip, a timed gap, or the
//! idle-loop settle delay) the task races that wait against incoming
//! commands, so pause and stop take effect between items: the wait is dropped
//! and the loop never moves on to the next one.

use std::fmt;
use std::future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use sign_types::QueueItem;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Sleep, sleep};
use tracing::{debug, warn};

use crate::media::{ClipEvent, ClipEvents, MediaPlayer};

/// Delay before an exhausted queue restarts while the idle loop is on.
pub const IDLE_LOOP_SETTLE: Duration = Duration::from_millis(400);
/// Number of upcoming labels carried in a snapshot.
pub const PREVIEW_WINDOW: usize = 20;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
    Finished,
}

/// Human-readable status line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
    Finished,
    NothingToPlay,
    ClickPlayToStart,
    DictionaryLoaded,
    DictionaryMissing,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Idle => "Idle",
            Status::Loading => "Loading…",
            Status::Playing => "Playing",
            Status::Paused => "Paused",
            Status::Stopped => "Stopped",
            Status::Finished => "Finished",
            Status::NothingToPlay => "Nothing to play",
            Status::ClickPlayToStart => "Click Play to start",
            Status::DictionaryLoaded => "Dictionary loaded",
            Status::DictionaryMissing => "Dictionary missing",
        })
    }
}

/// What observers see after every command or transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: PlaybackState,
    pub status: String,
    /// Index of the current item, `-1` before the first one.
    pub position: i64,
    pub current: Option<String>,
    pub next: Option<String>,
    pub queue_len: usize,
    pub preview: Vec<String>,
    pub can_step_prev: bool,
    pub can_step_next: bool,
    pub speed: f32,
    pub idle_loop: bool,
}

#[derive(Debug)]
enum Command {
    Play,
    Pause,
    Stop,
    StepPrev,
    StepNext,
    SetSpeed(f32),
    SetIdleLoop(bool),
    ReplaceQueue(Vec<QueueItem>),
    Announce(Status),
    Observe,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Snapshot>,
}

/// Cloneable command surface for one controller task.
#[derive(Clone)]
pub struct PlaybackHandle {
    requests: mpsc::UnboundedSender<Request>,
    snapshots: watch::Receiver<Snapshot>,
}

impl PlaybackHandle {
    /// Start a controller task driving `media`. Must be called inside a
    /// tokio runtime.
    pub fn spawn<M: MediaPlayer>(media: M) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let controller = PlaybackController::new(media);
        let (snapshot_tx, snapshots) = watch::channel(controller.snapshot());
        tokio::spawn(controller.run(rx, snapshot_tx));
        Self {
            requests,
            snapshots,
        }
    }

    pub async fn play(&self) -> Snapshot {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Snapshot {
        self.send(Command::Pause).await
    }

    pub async fn stop(&self) -> Snapshot {
        self.send(Command::Stop).await
    }

    pub async fn step_prev(&self) -> Snapshot {
        self.send(Command::StepPrev).await
    }

    pub async fn step_next(&self) -> Snapshot {
        self.send(Command::StepNext).await
    }

    pub async fn set_speed(&self, rate: f32) -> Snapshot {
        self.send(Command::SetSpeed(rate)).await
    }

    pub async fn set_idle_loop(&self, enabled: bool) -> Snapshot {
        self.send(Command::SetIdleLoop(enabled)).await
    }

    /// Install a freshly built queue, stopping any active loop first.
    pub async fn replace_queue(&self, queue: Vec<QueueItem>) -> Snapshot {
        self.send(Command::ReplaceQueue(queue)).await
    }

    pub async fn announce(&self, status: Status) -> Snapshot {
        self.send(Command::Announce(status)).await
    }

    /// Snapshot after all previously sent commands were applied.
    pub async fn snapshot(&self) -> Snapshot {
        self.send(Command::Observe).await
    }

    pub fn latest(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, command: Command) -> Snapshot {
        let (reply, rx) = oneshot::channel();
        if self.requests.send(Request { command, reply }).is_err() {
            return self.latest();
        }
        match rx.await {
            Ok(snapshot) => snapshot,
            Err(_) => self.latest(),
        }
    }
}

enum InFlight {
    Clip(ClipEvents),
    Hold(Pin<Box<Sleep>>),
    Settle(Pin<Box<Sleep>>),
}

enum Wake {
    ClipDone(ClipEvent),
    HoldElapsed,
    SettleElapsed,
}

// Never resolves while nothing is in flight.
async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> Wake {
    match in_flight {
        Some(InFlight::Clip(events)) => Wake::ClipDone(events.recv().await),
        Some(InFlight::Hold(timer)) => {
            timer.as_mut().await;
            Wake::HoldElapsed
        }
        Some(InFlight::Settle(timer)) => {
            timer.as_mut().await;
            Wake::SettleElapsed
        }
        None => future::pending().await,
    }
}

struct PlaybackController<M> {
    media: M,
    queue: Vec<QueueItem>,
    position: i64,
    state: PlaybackState,
    status: Status,
    stop_requested: bool,
    idle_loop: bool,
    speed: f32,
    in_flight: Option<InFlight>,
}

impl<M: MediaPlayer> PlaybackController<M> {
    fn new(media: M) -> Self {
        Self {
            media,
            queue: Vec::new(),
            position: -1,
            state: PlaybackState::Idle,
            status: Status::Idle,
            stop_requested: false,
            idle_loop: false,
            speed: 1.0,
            in_flight: None,
        }
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        snapshots: watch::Sender<Snapshot>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(Request { command, reply }) = request else {
                        break;
                    };
                    self.handle(command);
                    let snapshot = self.snapshot();
                    snapshots.send_replace(snapshot.clone());
                    let _ = reply.send(snapshot);
                }
                wake = wait_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.on_wake(wake);
                    snapshots.send_replace(self.snapshot());
                }
            }
        }
        debug!("playback controller shutting down");
        self.media.stop();
    }

    fn handle(&mut self, command: Command) {
        debug!("playback command {command:?} in state {:?}", self.state);
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::StepPrev => self.step_prev(),
            Command::StepNext => self.step_next(),
            Command::SetSpeed(rate) => {
                self.speed = rate;
                self.media.set_playback_rate(rate);
            }
            Command::SetIdleLoop(enabled) => self.idle_loop = enabled,
            Command::ReplaceQueue(queue) => self.replace_queue(queue),
            Command::Announce(status) => self.status = status,
            Command::Observe => {}
        }
    }

    fn on_wake(&mut self, wake: Wake) {
        match wake {
            Wake::ClipDone(ClipEvent::Ended) | Wake::HoldElapsed => self.advance(),
            Wake::ClipDone(ClipEvent::Error(reason)) => {
                warn!(
                    "clip {} failed, continuing: {reason}",
                    self.current_label().unwrap_or_default()
                );
                self.advance();
            }
            Wake::SettleElapsed => {
                if self.state == PlaybackState::Finished {
                    debug!("idle loop restarting queue");
                    self.position = -1;
                    self.play();
                }
            }
        }
    }

    fn play(&mut self) {
        if self.state == PlaybackState::Playing {
            return;
        }
        if self.queue.is_empty() {
            self.status = Status::NothingToPlay;
            return;
        }
        self.state = PlaybackState::Playing;
        self.status = Status::Playing;
        self.stop_requested = false;
        self.in_flight = None;
        self.advance();
    }

    // Dispatch the item after `position`, or finish if there is none.
    fn advance(&mut self) {
        if self.state != PlaybackState::Playing || self.stop_requested {
            return;
        }
        let next = self.position + 1;
        let Some(item) = self.item_at(next).cloned() else {
            self.finish();
            return;
        };
        self.position = next;

        match item {
            QueueItem::Pause { duration_ms } => {
                self.in_flight = Some(InFlight::Hold(Box::pin(sleep(Duration::from_millis(
                    duration_ms,
                )))));
            }
            QueueItem::Word { key, src } | QueueItem::Letter { key, src } => {
                self.media.set_playback_rate(self.speed);
                self.media.set_source(&src);
                match self.media.play() {
                    Ok(events) => {
                        self.status = Status::Playing;
                        self.in_flight = Some(InFlight::Clip(events));
                    }
                    Err(err) => {
                        warn!("clip {key} did not start: {err}");
                        self.position -= 1;
                        self.state = PlaybackState::Idle;
                        self.status = Status::ClickPlayToStart;
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Finished;
        self.status = Status::Finished;
        if self.idle_loop && !self.queue.is_empty() {
            self.in_flight = Some(InFlight::Settle(Box::pin(sleep(IDLE_LOOP_SETTLE))));
        }
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.media.pause();
        self.in_flight = None;
        self.state = PlaybackState::Paused;
        self.status = Status::Paused;
    }

    fn stop(&mut self) {
        self.stop_requested = true;
        self.media.stop();
        self.in_flight = None;
        self.position = -1;
        self.state = PlaybackState::Stopped;
        self.status = Status::Stopped;
    }

    // `advance` moves to `position + 1`, so stepping back lands two slots
    // behind the current item.
    fn step_prev(&mut self) {
        if self.position <= 0 {
            return;
        }
        self.pause();
        self.position = (self.position - 2).max(-1);
        self.play();
    }

    fn step_next(&mut self) {
        if self.position + 1 >= self.queue_len() {
            return;
        }
        self.pause();
        self.play();
    }

    fn replace_queue(&mut self, queue: Vec<QueueItem>) {
        let active = matches!(self.state, PlaybackState::Playing | PlaybackState::Paused);
        if active || self.in_flight.is_some() {
            self.stop();
        }
        if self.state == PlaybackState::Finished {
            self.state = PlaybackState::Idle;
        }
        debug!("installing queue of {} items", queue.len());
        self.queue = queue;
        self.position = -1;
    }

    fn queue_len(&self) -> i64 {
        self.queue.len() as i64
    }

    fn item_at(&self, position: i64) -> Option<&QueueItem> {
        usize::try_from(position)
            .ok()
            .and_then(|idx| self.queue.get(idx))
    }

    fn current_label(&self) -> Option<String> {
        self.item_at(self.position).map(QueueItem::label)
    }

    fn snapshot(&self) -> Snapshot {
        let upcoming = usize::try_from(self.position + 1).unwrap_or(0);
        let preview = self
            .queue
            .iter()
            .skip(upcoming)
            .take(PREVIEW_WINDOW)
            .map(|item| {
                if item.is_pause() {
                    "[PAUSE]".to_string()
                } else {
                    item.label()
                }
            })
            .collect();

        Snapshot {
            state: self.state,
            status: self.status.to_string(),
            position: self.position,
            current: self.current_label(),
            next: self.queue.get(upcoming).map(QueueItem::label),
            queue_len: self.queue.len(),
            preview,
            can_step_prev: self.position > 0,
            can_step_next: self.position + 1 < self.queue_len(),
            speed: self.speed,
            idle_loop: self.idle_loop,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::media::{ClipSignal, MediaError};

    #[derive(Clone, Copy)]
    enum Script {
        EndAfter(u64),
        FailAfter(u64),
        RejectOnce,
        Hang,
    }

    struct ScriptedPlayer {
        scripts: HashMap<String, Script>,
        rejected: HashSet<String>,
        source: Option<String>,
        hung: Option<ClipSignal>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedPlayer {
        fn new(scripts: &[(&str, Script)]) -> (Self, Arc<Mutex<Vec<String>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let player = Self {
                scripts: scripts
                    .iter()
                    .map(|(src, script)| (src.to_string(), *script))
                    .collect(),
                rejected: HashSet::new(),
                source: None,
                hung: None,
                log: Arc::clone(&log),
            };
            (player, log)
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl MediaPlayer for ScriptedPlayer {
        fn set_playback_rate(&mut self, _rate: f32) {}

        fn set_source(&mut self, src: &str) {
            self.source = Some(src.to_string());
        }

        fn play(&mut self) -> Result<ClipEvents, MediaError> {
            let src = self.source.clone().ok_or(MediaError::NoSource)?;
            let script = self
                .scripts
                .get(&src)
                .copied()
                .unwrap_or(Script::EndAfter(100));
            if let Script::RejectOnce = script
                && self.rejected.insert(src.clone())
            {
                self.record(format!("reject:{src}"));
                return Err(MediaError::StartRejected("autoplay blocked".into()));
            }
            self.record(format!("play:{src}"));
            let (signal, events) = ClipEvents::channel();
            match script {
                Script::EndAfter(ms) => {
                    tokio::spawn(async move {
                        sleep(Duration::from_millis(ms)).await;
                        signal.ended();
                    });
                }
                Script::RejectOnce => signal.ended(),
                Script::FailAfter(ms) => {
                    tokio::spawn(async move {
                        sleep(Duration::from_millis(ms)).await;
                        signal.failed("decode error");
                    });
                }
                Script::Hang => self.hung = Some(signal),
            }
            Ok(events)
        }

        fn pause(&mut self) {
            self.record("pause".into());
        }

        fn stop(&mut self) {
            self.record("stop".into());
            self.source = None;
            self.hung = None;
        }
    }

    fn letter(key: &str) -> QueueItem {
        QueueItem::Letter {
            key: key.into(),
            src: key.into(),
        }
    }

    fn plays(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("play:"))
            .cloned()
            .collect()
    }

    async fn wait_until(handle: &PlaybackHandle, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let mut rx = handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for snapshot")
            .expect("controller alive")
            .clone();
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn plays_queue_to_the_end() {
        let (player, log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        handle
            .replace_queue(vec![letter("A"), QueueItem::pause(120), letter("B")])
            .await;

        let snap = handle.play().await;
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(snap.position, 0);
        assert_eq!(snap.current.as_deref(), Some("A"));
        assert_eq!(snap.next.as_deref(), Some("PAUSE_120ms"));

        let done = wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(done.status, "Finished");
        assert_eq!(done.position, 2);
        assert_eq!(plays(&log), vec!["play:A", "play:B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn clip_error_still_advances() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::FailAfter(50))]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;

        let done = wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(done.position, 1);
        assert_eq!(plays(&log), vec!["play:A", "play:B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_last_clip_reaches_finished() {
        let (player, _log) = ScriptedPlayer::new(&[("B", Script::FailAfter(10))]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;
        let done = wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(done.current.as_deref(), Some("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_rejection_waits_for_manual_resume() {
        let (player, log) = ScriptedPlayer::new(&[("B", Script::RejectOnce)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;

        let blocked = wait_until(&handle, |s| s.status == "Click Play to start").await;
        assert_eq!(blocked.state, PlaybackState::Idle);
        assert_eq!(blocked.position, 0);

        let resumed = handle.play().await;
        assert_eq!(resumed.position, 1);
        assert_eq!(resumed.current.as_deref(), Some("B"));
        wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(plays(&log), vec!["play:A", "play:B"]);
        assert!(log.lock().unwrap().contains(&"reject:B".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_has_nothing_to_play() {
        let (player, log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        let snap = handle.play().await;
        assert_eq!(snap.state, PlaybackState::Idle);
        assert_eq!(snap.status, "Nothing to play");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_twice_is_stable() {
        let (player, _log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;

        let first = handle.stop().await;
        let second = handle.stop().await;
        assert_eq!(first, second);
        assert_eq!(second.state, PlaybackState::Stopped);
        assert_eq!(second.position, -1);
        assert_eq!(second.queue_len, 2);
        assert_eq!(second.status, "Stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_keeps_position_and_halts_loop() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::EndAfter(100))]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;

        let paused = handle.pause().await;
        assert_eq!(paused.state, PlaybackState::Paused);
        assert_eq!(paused.position, 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let later = handle.snapshot().await;
        assert_eq!(later.state, PlaybackState::Paused);
        assert_eq!(later.position, 0);
        assert_eq!(plays(&log), vec!["play:A"]);
        assert!(log.lock().unwrap().contains(&"pause".to_string()));

        // pausing again is a no-op
        assert_eq!(handle.pause().await, later);
    }

    #[tokio::test(start_paused = true)]
    async fn play_while_playing_is_a_no_op() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        let first = handle.play().await;
        let second = handle.play().await;
        assert_eq!(first, second);
        assert_eq!(plays(&log), vec!["play:A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn step_next_moves_to_following_item() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::Hang), ("B", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle
            .replace_queue(vec![letter("A"), letter("B"), letter("C")])
            .await;
        handle.play().await;

        let snap = handle.step_next().await;
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(snap.position, 1);
        assert_eq!(snap.current.as_deref(), Some("B"));
        assert_eq!(plays(&log), vec!["play:A", "play:B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn step_next_at_last_item_is_ignored() {
        let (player, _log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A")]).await;
        let playing = handle.play().await;
        assert!(!playing.can_step_next);
        assert_eq!(handle.step_next().await, playing);
    }

    #[tokio::test(start_paused = true)]
    async fn step_prev_replays_previous_item() {
        let (player, log) = ScriptedPlayer::new(&[("C", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle
            .replace_queue(vec![letter("A"), letter("B"), letter("C")])
            .await;
        handle.play().await;
        wait_until(&handle, |s| s.position == 2).await;

        let snap = handle.step_prev().await;
        assert_eq!(snap.position, 1);
        assert_eq!(snap.current.as_deref(), Some("B"));
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(plays(&log), vec!["play:A", "play:B", "play:C", "play:B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn step_prev_at_first_item_is_ignored() {
        let (player, _log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        let playing = handle.play().await;
        assert!(!playing.can_step_prev);
        assert_eq!(handle.step_prev().await, playing);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_loop_restarts_after_settling() {
        let (player, log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        handle.set_idle_loop(true).await;
        handle.replace_queue(vec![letter("A")]).await;
        handle.play().await;

        wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        let restarted = wait_until(&handle, |s| s.state == PlaybackState::Playing).await;
        assert_eq!(restarted.position, 0);
        assert_eq!(plays(&log), vec!["play:A", "play:A"]);

        let stopped = handle.stop().await;
        assert_eq!(stopped.state, PlaybackState::Stopped);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.snapshot().await.state, PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_idle_loop_applies_at_next_exhaustion() {
        let (player, log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A")]).await;
        handle.play().await;
        handle.set_idle_loop(true).await;
        handle.set_idle_loop(false).await;

        wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.snapshot().await.state, PlaybackState::Finished);
        assert_eq!(plays(&log), vec!["play:A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_queue_stops_active_loop() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;

        let snap = handle
            .replace_queue(vec![letter("X"), letter("Y"), letter("Z")])
            .await;
        assert_eq!(snap.state, PlaybackState::Stopped);
        assert_eq!(snap.position, -1);
        assert_eq!(snap.queue_len, 3);
        assert_eq!(snap.next.as_deref(), Some("X"));
        assert!(log.lock().unwrap().contains(&"stop".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn play_after_finish_stays_finished() {
        let (player, log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A")]).await;
        handle.play().await;
        wait_until(&handle, |s| s.state == PlaybackState::Finished).await;

        let again = handle.play().await;
        assert_eq!(again.state, PlaybackState::Finished);
        assert_eq!(again.status, "Finished");
        assert_eq!(again.position, 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(plays(&log), vec!["play:A"]);

        // stop rewinds, so the next play starts from the top
        handle.stop().await;
        let replay = handle.play().await;
        assert_eq!(replay.position, 0);
        assert_eq!(replay.state, PlaybackState::Playing);
        assert_eq!(plays(&log), vec!["play:A", "play:A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_queue_while_paused_stops() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::Hang)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;
        handle.play().await;
        handle.pause().await;

        let snap = handle.replace_queue(vec![letter("X")]).await;
        assert_eq!(snap.state, PlaybackState::Stopped);
        assert_eq!(snap.status, "Stopped");
        assert_eq!(snap.position, -1);
        assert_eq!(snap.next.as_deref(), Some("X"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["play:A".to_string(), "pause".to_string(), "stop".to_string()]
        );

        handle.play().await;
        assert_eq!(plays(&log), vec!["play:A", "play:X"]);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_after_pause_continues_with_next_item() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::EndAfter(100))]);
        let handle = PlaybackHandle::spawn(player);
        handle
            .replace_queue(vec![letter("A"), letter("B"), letter("C")])
            .await;
        handle.play().await;
        handle.pause().await;

        let resumed = handle.play().await;
        assert_eq!(resumed.state, PlaybackState::Playing);
        assert_eq!(resumed.position, 1);
        assert_eq!(resumed.current.as_deref(), Some("B"));

        let done = wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(done.position, 2);
        // the interrupted clip's completion must not drive a second loop
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(plays(&log), vec!["play:A", "play:B", "play:C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_first_item_is_retried_on_play() {
        let (player, log) = ScriptedPlayer::new(&[("A", Script::RejectOnce)]);
        let handle = PlaybackHandle::spawn(player);
        handle.replace_queue(vec![letter("A"), letter("B")]).await;

        let blocked = handle.play().await;
        assert_eq!(blocked.state, PlaybackState::Idle);
        assert_eq!(blocked.status, "Click Play to start");
        assert_eq!(blocked.position, -1);
        assert_eq!(blocked.next.as_deref(), Some("A"));

        let resumed = handle.play().await;
        assert_eq!(resumed.position, 0);
        assert_eq!(resumed.current.as_deref(), Some("A"));
        wait_until(&handle, |s| s.state == PlaybackState::Finished).await;
        assert_eq!(plays(&log), vec!["play:A", "play:B"]);
        assert_eq!(log.lock().unwrap()[0], "reject:A");
    }

    #[tokio::test(start_paused = true)]
    async fn preview_is_bounded_and_marks_pauses() {
        let (player, _log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        let mut queue = Vec::new();
        for _ in 0..15 {
            queue.push(letter("A"));
            queue.push(QueueItem::pause(120));
        }
        let snap = handle.replace_queue(queue).await;
        assert_eq!(snap.queue_len, 30);
        assert_eq!(snap.preview.len(), PREVIEW_WINDOW);
        assert_eq!(snap.preview[0], "A");
        assert_eq!(snap.preview[1], "[PAUSE]");
        assert_eq!(snap.current, None);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_and_announcements_show_in_snapshot() {
        let (player, _log) = ScriptedPlayer::new(&[]);
        let handle = PlaybackHandle::spawn(player);
        assert_eq!(handle.set_speed(1.5).await.speed, 1.5);
        let snap = handle.announce(Status::DictionaryMissing).await;
        assert_eq!(snap.status, "Dictionary missing");
        assert_eq!(handle.latest().status, "Dictionary missing");
    }
}
