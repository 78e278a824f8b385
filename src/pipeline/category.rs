//! Sound categories and their frequency bands
//!
//! Detection itself happens outside the pipeline; it hands over a list of
//! categories, each carrying the band a notch should target.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Frequency range occupied by a sound category
///
/// Always positive with `low_hz < high_hz`; every constructor, deserialization
/// included, goes through [`FrequencyBand::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBand", into = "RawBand")]
pub struct FrequencyBand {
    low_hz: f32,
    high_hz: f32,
}

/// Wire form of a band, validated on the way in
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawBand {
    low_hz: f32,
    high_hz: f32,
}

impl TryFrom<RawBand> for FrequencyBand {
    type Error = PipelineError;

    fn try_from(raw: RawBand) -> Result<Self> {
        FrequencyBand::new(raw.low_hz, raw.high_hz)
    }
}

impl From<FrequencyBand> for RawBand {
    fn from(band: FrequencyBand) -> Self {
        RawBand {
            low_hz: band.low_hz,
            high_hz: band.high_hz,
        }
    }
}

impl FrequencyBand {
    /// Create a band, rejecting non-positive or inverted ranges
    pub fn new(low_hz: f32, high_hz: f32) -> Result<Self> {
        let valid = low_hz.is_finite() && high_hz.is_finite() && low_hz > 0.0 && high_hz > low_hz;
        if !valid {
            return Err(PipelineError::InvalidBand { low_hz, high_hz });
        }
        Ok(Self { low_hz, high_hz })
    }

    /// Parse the textual form used by detectors, e.g. `"400-1200Hz"`
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || PipelineError::InvalidBand {
            low_hz: f32::NAN,
            high_hz: f32::NAN,
        };
        let trimmed = text.trim();
        let body = trimmed
            .strip_suffix("Hz")
            .or_else(|| trimmed.strip_suffix("hz"))
            .unwrap_or(trimmed);
        let (low, high) = body.split_once('-').ok_or_else(invalid)?;
        let low: f32 = low.trim().parse().map_err(|_| invalid())?;
        let high: f32 = high.trim().parse().map_err(|_| invalid())?;
        Self::new(low, high)
    }

    pub fn low_hz(&self) -> f32 {
        self.low_hz
    }

    pub fn high_hz(&self) -> f32 {
        self.high_hz
    }

    /// Geometric center: `sqrt(low * high)`
    pub fn center_hz(&self) -> f32 {
        (self.low_hz * self.high_hz).sqrt()
    }

    /// Quality factor of a filter spanning the band: `center / (high - low)`
    pub fn q(&self) -> f32 {
        self.center_hz() / (self.high_hz - self.low_hz)
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}Hz", self.low_hz, self.high_hz)
    }
}

/// A detectable class of sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundCategory {
    pub id: String,
    pub display_name: String,
    pub band: FrequencyBand,
}

const CATALOG: &[(&str, &str, f32, f32)] = &[
    ("dog_bark", "Dog Barking", 400.0, 1200.0),
    ("tv_noise", "Television", 100.0, 8000.0),
    ("toilet", "Toilet/Water Sounds", 300.0, 900.0),
    ("background_chatter", "Background Conversations", 200.0, 3000.0),
    ("fan_noise", "Fan/Air Conditioning", 50.0, 300.0),
    ("keyboard_typing", "Keyboard Typing", 1000.0, 5000.0),
    ("traffic", "Traffic/Vehicle Sounds", 80.0, 1000.0),
    ("door_sounds", "Door Slamming", 50.0, 500.0),
];

impl SoundCategory {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, band: FrequencyBand) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            band,
        }
    }

    /// Every category the detector knows about
    pub fn catalog() -> Vec<SoundCategory> {
        CATALOG
            .iter()
            .map(|&(id, name, low_hz, high_hz)| {
                SoundCategory::new(id, name, FrequencyBand { low_hz, high_hz })
            })
            .collect()
    }

    /// Look up a catalog entry by id
    pub fn find(id: &str) -> Option<SoundCategory> {
        Self::catalog().into_iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_band_derivation() {
        let band = FrequencyBand::new(400.0, 1200.0).unwrap();
        assert_relative_eq!(band.center_hz(), 692.820_3, epsilon = 1e-3);
        assert_relative_eq!(band.q(), 0.866_025, epsilon = 1e-4);
    }

    #[test]
    fn test_parse() {
        let band = FrequencyBand::parse("400-1200Hz").unwrap();
        assert_eq!(band, FrequencyBand::new(400.0, 1200.0).unwrap());
        assert_eq!(FrequencyBand::parse(" 50 - 300 ").unwrap().high_hz(), 300.0);
        assert_eq!(band.to_string(), "400-1200Hz");
    }

    #[test]
    fn test_invalid_bands() {
        assert!(FrequencyBand::new(1200.0, 400.0).is_err());
        assert!(FrequencyBand::new(0.0, 400.0).is_err());
        assert!(FrequencyBand::new(400.0, 400.0).is_err());
        assert!(FrequencyBand::parse("loud").is_err());
        assert!(FrequencyBand::parse("a-bHz").is_err());
    }

    #[test]
    fn test_catalog() {
        let catalog = SoundCategory::catalog();
        assert_eq!(catalog.len(), 8);
        assert!(catalog
            .iter()
            .all(|c| FrequencyBand::new(c.band.low_hz(), c.band.high_hz()).is_ok()));
        assert_eq!(SoundCategory::find("fan_noise").unwrap().band.high_hz(), 300.0);
        assert!(SoundCategory::find("thunder").is_none());
    }

    #[test]
    fn test_deserialize_validates_band() {
        let band: FrequencyBand = serde_json::from_str(r#"{"low_hz":400.0,"high_hz":1200.0}"#).unwrap();
        assert_eq!(band, FrequencyBand::new(400.0, 1200.0).unwrap());
        assert_eq!(
            serde_json::to_string(&band).unwrap(),
            r#"{"low_hz":400.0,"high_hz":1200.0}"#
        );

        for json in [
            r#"{"low_hz":1200.0,"high_hz":400.0}"#,
            r#"{"low_hz":0.0,"high_hz":0.0}"#,
            r#"{"low_hz":-50.0,"high_hz":300.0}"#,
        ] {
            let err = serde_json::from_str::<FrequencyBand>(json).unwrap_err();
            assert!(err.to_string().contains("Invalid frequency band"), "{}", err);
        }
    }
}
