// Audio capture, analysis, pulse detection and interval statistics for ticktock.

pub mod analyser;
pub mod capture;
pub mod conditioning;
pub mod detector;
pub mod error;
pub mod events;
pub mod features;
pub mod history;
pub mod pipeline;
pub mod session;
pub mod stats;

pub use error::AudioError;
pub use events::{ChannelListener, SessionEvent};
pub use session::Session;
pub use stats::{IntervalStats, RunningStats, Stability, StatsSnapshot};
