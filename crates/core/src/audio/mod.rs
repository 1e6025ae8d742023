use std::{collections::VecDeque, f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{config::AnalyserConfig, PulseError, Result, SampleFrame};

const KICK_HZ: f32 = 60.0;
const KICK_DECAY_SECONDS: f32 = 0.04;
const KICK_LENGTH_SECONDS: f32 = 0.2;

/// Capability the beat loop needs from whatever produces the audio signal.
pub trait SignalSource {
    /// Samples the spectrum and waveform as of now.
    fn current_frame(&mut self) -> SampleFrame;

    /// Whether the source is currently producing a signal.
    fn is_active(&self) -> bool;
}

/// Turns mono PCM into byte spectra and waveforms the way a browser
/// analyser node does: Blackman window, FFT, temporal smoothing and a
/// decibel-to-byte mapping.
pub struct PcmAnalyser {
    config: AnalyserConfig,
    window: VecDeque<f32>,
    smoothed: Vec<f32>,
    active: bool,
    fft: FftResources,
}

impl PcmAnalyser {
    pub fn new(config: AnalyserConfig) -> Result<Self> {
        config.validate()?;

        let size = config.fft_size;
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let fft = FftResources {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            window: std::iter::repeat(0.0).take(size).collect(),
            smoothed: vec![0.0; config.bin_count()],
            active: false,
            fft,
            config,
        })
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Marks the signal as playing or paused.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Appends samples, keeping only the most recent FFT window.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let size = self.config.fft_size;
        let fresh = &samples[samples.len().saturating_sub(size)..];
        self.window.extend(fresh.iter().copied());
        let overflow = self.window.len().saturating_sub(size);
        self.window.drain(..overflow);
    }

    /// Clears buffered audio and the smoothed spectrum.
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|sample| *sample = 0.0);
        self.smoothed.fill(0.0);
    }

    /// Produces a frame from the current window.
    pub fn analyse(&mut self) -> Result<SampleFrame> {
        let size = self.config.fft_size;
        let tau = self.config.smoothing_time_constant;
        let min_db = self.config.min_decibels;
        let scale = 255.0 / (self.config.max_decibels - min_db);

        let fft = &mut self.fft;
        for (index, (slot, sample)) in fft.input.iter_mut().zip(self.window.iter()).enumerate() {
            *slot = sample * blackman_value(index, size);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let frequency = self
            .smoothed
            .iter_mut()
            .zip(fft.spectrum.iter())
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / size as f32;
                let magnitude = if magnitude.is_finite() { magnitude } else { 0.0 };
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
                decibel_byte(*smoothed, min_db, scale)
            })
            .collect();

        let bins = self.config.bin_count();
        let time = self
            .window
            .iter()
            .skip(size - bins)
            .map(|&sample| time_byte(sample))
            .collect();

        Ok(SampleFrame::new(frequency, time))
    }
}

impl SignalSource for PcmAnalyser {
    fn current_frame(&mut self) -> SampleFrame {
        match self.analyse() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "analyser failed, reporting silence");
                SampleFrame::silent(self.config.bin_count())
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for PcmAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmAnalyser")
            .field("config", &self.config)
            .field("active", &self.active)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

fn decibel_byte(magnitude: f32, min_db: f32, scale: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    (scale * (db - min_db)).floor().clamp(0.0, 255.0) as u8
}

fn time_byte(sample: f32) -> u8 {
    (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8
}

/// Synthesises a train of decaying low kicks at `bpm`.
pub fn kick_train(bpm: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * f64::from(sample_rate)).max(0.0) as usize;
    if !(bpm.is_finite() && bpm > 0.0) {
        return vec![0.0; total];
    }

    let period = ((60.0 / bpm) * f64::from(sample_rate)).round().max(1.0) as usize;
    (0..total)
        .map(|index| {
            let t = (index % period) as f32 / sample_rate as f32;
            if t >= KICK_LENGTH_SECONDS {
                0.0
            } else {
                (2.0 * PI * KICK_HZ * t).sin() * (-t / KICK_DECAY_SECONDS).exp()
            }
        })
        .collect()
}

/// One tick captured from a live analyser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTick {
    pub time_ms: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub frequency: Vec<u8>,
    #[serde(default)]
    pub time: Vec<u8>,
}

fn default_active() -> bool {
    true
}

/// Replays recorded ticks in order. The driver calls [`advance`] once per
/// tick.
///
/// [`advance`]: RecordedSource::advance
#[derive(Debug, Clone)]
pub struct RecordedSource {
    ticks: Vec<RecordedTick>,
    cursor: usize,
}

impl RecordedSource {
    pub fn new(ticks: Vec<RecordedTick>) -> Self {
        Self { ticks, cursor: 0 }
    }

    /// Parses one JSON object per line; blank lines are skipped.
    pub fn from_json_lines(text: &str) -> Result<Self> {
        let ticks = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).map_err(|err| {
                    PulseError::from(format!("recording line {}: {err}", number + 1))
                })
            })
            .collect::<Result<Vec<RecordedTick>>>()?;

        if ticks.is_empty() {
            return Err(PulseError::InvalidInput("recording contains no ticks"));
        }
        Ok(Self::new(ticks))
    }

    pub fn current(&self) -> Option<&RecordedTick> {
        self.ticks.get(self.cursor)
    }

    /// Moves to the next tick; returns `false` once the recording is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.cursor < self.ticks.len() {
            self.cursor += 1;
        }
        self.cursor < self.ticks.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.ticks.len()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

impl SignalSource for RecordedSource {
    fn current_frame(&mut self) -> SampleFrame {
        self.current()
            .map(|tick| SampleFrame::new(tick.frequency.clone(), tick.time.clone()))
            .unwrap_or_default()
    }

    fn is_active(&self) -> bool {
        self.current().map_or(false, |tick| tick.active)
    }
}
