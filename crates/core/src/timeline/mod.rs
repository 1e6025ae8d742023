use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::LevelsConfig, BandLevels, BeatSummary, EstimatorState, LevelTracker, SignalSource,
};

/// Deterministic millisecond clock for offline drivers.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_ms: f64,
}

impl PlaybackClock {
    pub fn now_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn reset(&mut self) {
        self.time_ms = 0.0;
    }

    pub fn advance(&mut self, delta_ms: f64) {
        self.time_ms = (self.time_ms + delta_ms).max(self.time_ms);
    }
}

/// Everything published for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    /// Strictly increasing, starting at 1.
    pub sequence: u64,
    pub time_ms: f64,
    pub active: bool,
    pub summary: BeatSummary,
    pub levels: BandLevels,
}

/// Host loop owning the single estimator state. Call [`BeatLoop::tick`] once
/// per animation frame; stopping the loop is simply not calling it again.
#[derive(Debug)]
pub struct BeatLoop<S> {
    source: S,
    state: EstimatorState,
    levels: LevelTracker,
    was_active: bool,
    sequence: u64,
    last_time_ms: Option<f64>,
}

impl<S: SignalSource> BeatLoop<S> {
    pub fn new(source: S, levels: &LevelsConfig) -> Self {
        Self {
            source,
            state: EstimatorState::new(),
            levels: LevelTracker::new(levels),
            was_active: false,
            sequence: 0,
            last_time_ms: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn tick(&mut self, now_ms: f64) -> TickOutput {
        let now_ms = self.monotonic(now_ms);
        let active = self.source.is_active();

        if self.was_active && !active {
            info!(now_ms, "signal stopped, resetting beat estimator");
            self.reset();
        }
        self.was_active = active;

        let state = std::mem::take(&mut self.state);
        let (state, summary) = if active {
            let frame = self.source.current_frame();
            self.levels.update(&frame);
            state.step(&frame, now_ms)
        } else {
            state.idle()
        };
        self.state = state;
        self.sequence += 1;

        TickOutput {
            sequence: self.sequence,
            time_ms: now_ms,
            active,
            summary,
            levels: self.levels.levels(),
        }
    }

    /// Clears the estimator and band levels, as when playback stops.
    pub fn reset(&mut self) {
        self.state.reset();
        self.levels.reset();
    }

    fn monotonic(&mut self, now_ms: f64) -> f64 {
        let now_ms = match self.last_time_ms {
            Some(last) if !(now_ms >= last) => {
                warn!(now_ms, last, "tick timestamp went backwards, holding previous");
                last
            }
            None if !now_ms.is_finite() => 0.0,
            _ => now_ms,
        };
        self.last_time_ms = Some(now_ms);
        now_ms
    }
}
