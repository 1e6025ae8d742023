use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PulseError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analyser: AnalyserConfig,
    pub levels: LevelsConfig,
    pub tick: TickConfig,
}

impl AppConfig {
    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.analyser.validate()?;
        self.levels.validate()?;
        self.tick.validate()
    }
}

/// Settings of the PCM front end that produces sample frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub sample_rate: u32,
    /// Window length of the FFT. Frames carry `fft_size / 2` bins.
    pub fft_size: usize,
    /// Weight of the previous spectrum when smoothing over time, in [0, 1].
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
            smoothing_time_constant: 0.85,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    /// Number of frequency bins in each produced frame.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("analyser.sample_rate must be positive"));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(invalid(format!(
                "analyser.fft_size must be a power of two in [32, 32768], got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(invalid("analyser.smoothing_time_constant must lie in [0, 1]"));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(invalid(
                "analyser.min_decibels must be below analyser.max_decibels",
            ));
        }
        Ok(())
    }
}

/// Settings for the smoothed band levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    /// Fraction of the gap to the raw level closed every tick.
    pub response: f32,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self { response: 0.15 }
    }
}

impl LevelsConfig {
    fn validate(&self) -> Result<()> {
        if self.response > 0.0 && self.response <= 1.0 {
            Ok(())
        } else {
            Err(invalid("levels.response must lie in (0, 1]"))
        }
    }
}

/// Nominal tick cadence used by the offline drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub rate_hz: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { rate_hz: 60.0 }
    }
}

impl TickConfig {
    pub fn interval_ms(&self) -> f64 {
        1000.0 / self.rate_hz
    }

    fn validate(&self) -> Result<()> {
        if self.rate_hz.is_finite() && self.rate_hz > 0.0 {
            Ok(())
        } else {
            Err(invalid("tick.rate_hz must be positive"))
        }
    }
}

fn invalid(msg: impl Into<String>) -> PulseError {
    PulseError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyser.bin_count(), 128);
        assert!((config.tick.interval_ms() - 16.666).abs() < 0.01);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config = AppConfig::from_json_str(r#"{ "analyser": { "fft_size": 512 } }"#).unwrap();
        assert_eq!(config.analyser.fft_size, 512);
        assert_eq!(config.analyser.sample_rate, 48_000);
        assert_eq!(config.levels.response, 0.15);
    }

    #[test]
    fn rejects_unusable_values() {
        let err = AppConfig::from_json_str(r#"{ "analyser": { "fft_size": 300 } }"#).unwrap_err();
        assert!(format!("{err}").contains("fft_size"));

        let err = AppConfig::from_json_str(
            r#"{ "analyser": { "min_decibels": -20, "max_decibels": -30 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PulseError::InvalidConfig(_)));

        assert!(AppConfig::from_json_str(r#"{ "levels": { "response": 0 } }"#).is_err());
        assert!(AppConfig::from_json_str(r#"{ "tick": { "rate_hz": -1 } }"#).is_err());
    }

    #[test]
    fn malformed_json_surfaces_as_json_error() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, PulseError::Json(_)));
    }
}
