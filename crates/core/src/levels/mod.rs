use serde::{Deserialize, Serialize};

use crate::{
    analysis::{band_end, band_mean, BASS_FRACTION},
    config::LevelsConfig,
    SampleFrame,
};

const MID_FRACTION: f64 = 0.5;

/// Normalised [0, 1] energy per frequency band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub average: f32,
}

impl BandLevels {
    /// Unsmoothed levels of a single frame.
    pub fn from_frame(frame: &SampleFrame) -> Self {
        let bins = &frame.frequency;
        let bass_end = band_end(bins.len(), BASS_FRACTION);
        let mid_end = band_end(bins.len(), MID_FRACTION).max(bass_end);

        let bass = band_mean(&bins[..bass_end]);
        let mid = band_mean(&bins[bass_end..mid_end]);
        let treble = band_mean(&bins[mid_end..]);

        Self {
            bass,
            mid,
            treble,
            average: (bass + mid + treble) / 3.0,
        }
    }
}

/// Follows the raw band levels slowly so decorations react gently.
#[derive(Debug, Clone)]
pub struct LevelTracker {
    response: f32,
    levels: BandLevels,
}

impl LevelTracker {
    pub fn new(config: &LevelsConfig) -> Self {
        Self {
            response: config.response,
            levels: BandLevels::default(),
        }
    }

    pub fn levels(&self) -> BandLevels {
        self.levels
    }

    pub fn update(&mut self, frame: &SampleFrame) -> BandLevels {
        let raw = BandLevels::from_frame(frame);
        let response = self.response;
        let follow = |current: f32, target: f32| current + (target - current) * response;

        self.levels = BandLevels {
            bass: follow(self.levels.bass, raw.bass),
            mid: follow(self.levels.mid, raw.mid),
            treble: follow(self.levels.treble, raw.treble),
            average: follow(self.levels.average, raw.average),
        };
        self.levels
    }

    pub fn reset(&mut self) {
        self.levels = BandLevels::default();
    }
}
