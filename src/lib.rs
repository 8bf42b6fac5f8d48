pub mod handlers;
pub mod media;
pub mod playback;
pub mod session;

pub use handlers::{AppState, router};
pub use media::{ClipEvent, ClipEvents, ClipSignal, MediaError, MediaPlayer, SimulatedPlayer};
pub use playback::{PlaybackHandle, PlaybackState, Snapshot, Status};
pub use session::{MAX_SPEED, Session, SessionError};
