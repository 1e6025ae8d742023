use std::{collections::VecDeque, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Fraction of the lowest frequency bins treated as the bass band.
pub const BASS_FRACTION: f64 = 0.15;

const PEAK_DECAY: f32 = 0.995;
const ENERGY_HISTORY: usize = 20;
const WARM_UP_SAMPLES: usize = 10;
const THRESHOLD_FRACTION: f32 = 0.3;
const MIN_RISE_RATIO: f32 = 1.08;
/// Hard floor between beats, 240 BPM.
const MIN_BEAT_GAP_MS: f64 = 250.0;
const BEAT_HISTORY: usize = 8;
const VALID_INTERVAL_MS: RangeInclusive<f64> = 300.0..=1200.0;
const VALID_BPM: RangeInclusive<f64> = 50.0..=200.0;
const TEMPO_BLEND: f64 = 0.3;
const INTENSITY_DECAY: f32 = 0.08;
const IDLE_INTENSITY_DECAY: f32 = 0.05;
const MIN_CONFIDENT_BEATS: usize = 3;
const FULL_CONFIDENCE_BEATS: f32 = 6.0;
const WAVEFORM_STRIDE: usize = 4;

/// Byte spectrum and waveform captured from the analyser for one tick.
///
/// `frequency` holds one magnitude per bin, low to high. `time` holds the raw
/// waveform centred at 128.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFrame {
    pub frequency: Vec<u8>,
    pub time: Vec<u8>,
}

impl SampleFrame {
    pub fn new(frequency: Vec<u8>, time: Vec<u8>) -> Self {
        Self { frequency, time }
    }

    /// A frame of `bins` silent bins with a flat waveform.
    pub fn silent(bins: usize) -> Self {
        Self {
            frequency: vec![0; bins],
            time: vec![128; bins],
        }
    }

    /// Mean bass-band magnitude normalised to [0, 1].
    pub fn bass_energy(&self) -> f32 {
        let end = band_end(self.frequency.len(), BASS_FRACTION);
        band_mean(&self.frequency[..end])
    }

    /// Every fourth time-domain sample mapped from [0, 255] to [-1, 1].
    pub fn waveform(&self) -> Vec<f32> {
        self.time
            .iter()
            .step_by(WAVEFORM_STRIDE)
            .map(|&sample| (f32::from(sample) - 128.0) / 128.0)
            .collect()
    }
}

/// Per-tick output handed to visual consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatSummary {
    pub is_beat: bool,
    pub bpm: u32,
    pub confidence: f32,
    pub beat_intensity: f32,
    pub waveform: Vec<f32>,
}

/// Everything the estimator remembers between ticks.
///
/// The state is a plain value: [`EstimatorState::step`] consumes it together
/// with the current frame and returns the next state alongside the summary.
/// `Default` is the state of a fresh session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorState {
    energy_history: VecDeque<f32>,
    beat_timestamps: VecDeque<f64>,
    last_beat_ms: Option<f64>,
    peak_energy: f32,
    smoothed_bpm: f64,
    beat_intensity: f32,
    reported_bpm: u32,
    reported_confidence: f32,
}

impl EstimatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the session's detection history and tempo. The beat envelope
    /// survives so it can fade out on the idle ticks that follow.
    pub fn reset(&mut self) {
        *self = Self {
            beat_intensity: self.beat_intensity,
            ..Self::default()
        };
    }

    /// Runs detection for one tick of an active signal.
    pub fn step(mut self, frame: &SampleFrame, now_ms: f64) -> (Self, BeatSummary) {
        let energy = frame.bass_energy();
        self.peak_energy = (self.peak_energy * PEAK_DECAY).max(energy);

        self.energy_history.push_back(energy);
        if self.energy_history.len() > ENERGY_HISTORY {
            self.energy_history.pop_front();
        }

        let average = mean(self.energy_history.iter().copied());
        let threshold = average + THRESHOLD_FRACTION * (self.peak_energy - average);
        let gap_elapsed = self
            .last_beat_ms
            .map_or(true, |last| now_ms - last > MIN_BEAT_GAP_MS);

        let is_beat = energy > threshold
            && energy > average * MIN_RISE_RATIO
            && gap_elapsed
            && self.energy_history.len() >= WARM_UP_SAMPLES;

        trace!(energy, average, threshold, peak = self.peak_energy, "estimator tick");

        if is_beat {
            self.register_beat(now_ms);
            self.beat_intensity = 1.0;
        } else {
            self.beat_intensity = (self.beat_intensity - INTENSITY_DECAY).max(0.0);
        }

        let summary = BeatSummary {
            is_beat,
            bpm: self.smoothed_bpm.round() as u32,
            confidence: self.confidence(),
            beat_intensity: self.beat_intensity,
            waveform: frame.waveform(),
        };
        self.reported_bpm = summary.bpm;
        self.reported_confidence = summary.confidence;

        (self, summary)
    }

    /// Tick while the signal is paused or disconnected: no detection, the
    /// envelope fades and the last reported tempo is carried over.
    pub fn idle(mut self) -> (Self, BeatSummary) {
        self.beat_intensity = (self.beat_intensity - IDLE_INTENSITY_DECAY).max(0.0);
        let summary = BeatSummary {
            is_beat: false,
            bpm: self.reported_bpm,
            confidence: self.reported_confidence,
            beat_intensity: self.beat_intensity,
            waveform: Vec::new(),
        };
        (self, summary)
    }

    /// Current smoothed tempo, 0 until the first estimate.
    pub fn smoothed_bpm(&self) -> f64 {
        self.smoothed_bpm
    }

    pub fn peak_energy(&self) -> f32 {
        self.peak_energy
    }

    pub fn beat_intensity(&self) -> f32 {
        self.beat_intensity
    }

    pub fn last_beat_ms(&self) -> Option<f64> {
        self.last_beat_ms
    }

    pub fn energy_history_len(&self) -> usize {
        self.energy_history.len()
    }

    pub fn beat_count(&self) -> usize {
        self.beat_timestamps.len()
    }

    /// How many recent beats back the tempo: 0 below three, full at six.
    pub fn confidence(&self) -> f32 {
        let beats = self.beat_timestamps.len();
        if beats >= MIN_CONFIDENT_BEATS {
            (beats as f32 / FULL_CONFIDENCE_BEATS).min(1.0)
        } else {
            0.0
        }
    }

    fn register_beat(&mut self, now_ms: f64) {
        self.last_beat_ms = Some(now_ms);
        self.beat_timestamps.push_back(now_ms);
        if self.beat_timestamps.len() > BEAT_HISTORY {
            self.beat_timestamps.pop_front();
        }

        let Some(raw_bpm) = self.raw_bpm() else {
            debug!(now_ms, "beat detected");
            return;
        };

        if VALID_BPM.contains(&raw_bpm) {
            let blend = if self.smoothed_bpm == 0.0 { 1.0 } else { TEMPO_BLEND };
            self.smoothed_bpm = self.smoothed_bpm * (1.0 - blend) + raw_bpm * blend;
            debug!(now_ms, raw_bpm, bpm = self.smoothed_bpm, "beat detected");
        } else {
            debug!(now_ms, raw_bpm, "beat detected, tempo outside range discarded");
        }
    }

    /// Tempo implied by the plausible intervals between recorded beats.
    fn raw_bpm(&self) -> Option<f64> {
        let (sum, count) = self
            .beat_timestamps
            .iter()
            .zip(self.beat_timestamps.iter().skip(1))
            .map(|(earlier, later)| later - earlier)
            .filter(|interval| VALID_INTERVAL_MS.contains(interval))
            .fold((0.0, 0usize), |(sum, count), interval| (sum + interval, count + 1));

        (count > 0).then(|| 60_000.0 / (sum / count as f64))
    }
}

/// Exclusive end index of a band covering the lowest `fraction` of `len` bins.
pub(crate) fn band_end(len: usize, fraction: f64) -> usize {
    ((len as f64 * fraction).floor() as usize).min(len)
}

/// Mean of the bins normalised to [0, 1]; an empty band reads as silence.
pub(crate) fn band_mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&bin| u32::from(bin)).sum();
    sum as f32 / bins.len() as f32 / 255.0
}

fn mean(values: impl ExactSizeIterator<Item = f32>) -> f32 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f32>() / len as f32
}
