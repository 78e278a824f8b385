//! Enhancement presets and dynamics mappings
//!
//! Presets only retune the EQ and compressor; they never change topology.
//! Two independent mappings write the same compressor parameters: the
//! preset compression level and the "amplify quiet sounds" level. Whichever
//! ran last wins.

use serde::Serialize;

use crate::dsp::DynamicsSettings;
use crate::error::{PipelineError, Result};

/// Upper end of both 0-10 control scales
pub const MAX_LEVEL: u8 = 10;

/// Immutable preset record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub eq_low_gain_db: f32,
    pub eq_mid_gain_db: f32,
    pub eq_high_gain_db: f32,
    /// Compression on a 0-10 scale
    pub compression_level: u8,
}

const PRESETS: &[Preset] = &[
    Preset {
        id: "none",
        display_name: "No Enhancement",
        description: "Original audio without enhancements",
        eq_low_gain_db: 0.0,
        eq_mid_gain_db: 0.0,
        eq_high_gain_db: 0.0,
        compression_level: 0,
    },
    Preset {
        id: "speech",
        display_name: "Speech Enhancement",
        description: "Clearer voices with reduced background noise",
        eq_low_gain_db: -3.0,
        eq_mid_gain_db: 4.0,
        eq_high_gain_db: 2.0,
        compression_level: 6,
    },
    Preset {
        id: "clarity",
        display_name: "Audio Clarity",
        description: "Enhanced overall clarity for all audio types",
        eq_low_gain_db: -2.0,
        eq_mid_gain_db: 3.0,
        eq_high_gain_db: 3.0,
        compression_level: 4,
    },
    Preset {
        id: "podcast",
        display_name: "Podcast Mode",
        description: "Optimized for spoken word recordings",
        eq_low_gain_db: -4.0,
        eq_mid_gain_db: 5.0,
        eq_high_gain_db: 1.0,
        compression_level: 7,
    },
    Preset {
        id: "music",
        display_name: "Music Balance",
        description: "Balanced enhancement for music",
        eq_low_gain_db: 2.0,
        eq_mid_gain_db: 0.0,
        eq_high_gain_db: 2.0,
        compression_level: 3,
    },
];

impl Preset {
    pub fn all() -> &'static [Preset] {
        PRESETS
    }

    pub fn find(id: &str) -> Option<&'static Preset> {
        PRESETS.iter().find(|p| p.id == id)
    }

    /// Like [`Preset::find`] but as an error for API callers
    pub fn lookup(id: &str) -> Result<&'static Preset> {
        Self::find(id).ok_or_else(|| PipelineError::UnknownPreset {
            preset: id.to_string(),
        })
    }

    pub fn compression(&self) -> DynamicsSettings {
        compression_settings(self.compression_level)
    }
}

/// Preset compression mapping
pub fn compression_settings(level: u8) -> DynamicsSettings {
    let level = level.min(MAX_LEVEL) as f32;
    DynamicsSettings {
        threshold_db: -30.0 - 2.0 * level,
        ratio: 1.0 + 0.5 * level,
        knee_db: 10.0 - 0.5 * level,
        attack_secs: 0.003,
        release_secs: 0.25,
    }
}

/// Amplify-quiet mapping; ratios fall below 1 as the level rises
pub fn amplify_quiet_settings(level: u8) -> DynamicsSettings {
    let level = level.min(MAX_LEVEL) as f32;
    DynamicsSettings {
        threshold_db: -50.0 - 2.0 * level,
        ratio: 1.0 - 0.05 * level,
        knee_db: 15.0,
        attack_secs: 0.02,
        release_secs: 0.3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case("none", 0.0, 0.0, 0.0, 0 ; "none")]
    #[test_case("speech", -3.0, 4.0, 2.0, 6 ; "speech")]
    #[test_case("clarity", -2.0, 3.0, 3.0, 4 ; "clarity")]
    #[test_case("podcast", -4.0, 5.0, 1.0, 7 ; "podcast")]
    #[test_case("music", 2.0, 0.0, 2.0, 3 ; "music")]
    fn test_preset_table(id: &str, low: f32, mid: f32, high: f32, compression: u8) {
        let preset = Preset::find(id).unwrap();
        assert_eq!(preset.eq_low_gain_db, low);
        assert_eq!(preset.eq_mid_gain_db, mid);
        assert_eq!(preset.eq_high_gain_db, high);
        assert_eq!(preset.compression_level, compression);
    }

    #[test]
    fn test_clarity_compression() {
        let settings = Preset::find("clarity").unwrap().compression();
        assert_eq!(settings.threshold_db, -38.0);
        assert_eq!(settings.ratio, 3.0);
        assert_eq!(settings.knee_db, 8.0);
        assert_eq!(settings.attack_secs, 0.003);
        assert_eq!(settings.release_secs, 0.25);
    }

    #[test]
    fn test_amplify_quiet_mapping() {
        let settings = amplify_quiet_settings(8);
        assert_eq!(settings.threshold_db, -66.0);
        assert_relative_eq!(settings.ratio, 0.6, epsilon = 1e-6);
        assert_eq!(settings.knee_db, 15.0);
        assert_eq!(settings.attack_secs, 0.02);
        assert_eq!(settings.release_secs, 0.3);

        assert_eq!(amplify_quiet_settings(0).ratio, 1.0);
        assert_eq!(amplify_quiet_settings(42), amplify_quiet_settings(MAX_LEVEL));
    }

    #[test]
    fn test_unknown_preset() {
        let err = Preset::lookup("loudness-war").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PRESET");
    }
}
