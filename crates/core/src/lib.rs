//! Core library for the Lofi Pulse focus timer.
//!
//! The crate holds the audio-reactive side of the widget: a heuristic beat and
//! tempo estimator driven once per animation tick, smoothed band levels for the
//! ambient decorations, and the sources that feed them. The estimator is a
//! plain state value stepped by [`EstimatorState::step`], so it can be driven
//! by the [`BeatLoop`] host loop, by tests, or by the command line app alike.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod levels;
pub mod timeline;

pub use analysis::{BeatSummary, EstimatorState, SampleFrame};
pub use audio::{kick_train, PcmAnalyser, RecordedSource, RecordedTick, SignalSource};
pub use config::{AnalyserConfig, AppConfig, LevelsConfig, TickConfig};
pub use error::{PulseError, Result};
pub use levels::{BandLevels, LevelTracker};
pub use timeline::{BeatLoop, PlaybackClock, TickOutput};
