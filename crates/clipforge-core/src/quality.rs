// crates/clipforge-core/src/quality.rs
//
// Export quality presets.
//
// Each profile pins {video bitrate, frame rate, x264 preset}. The encoder
// backend receives a resolved `EncodeParams`, never a profile name, so the
// table below is the single place those numbers live.

use serde::{Deserialize, Serialize};

/// Output audio bitrate shared by all profiles (AAC).
pub const AUDIO_BITRATE_KBPS: u32 = 128;

/// Encoder effort level, mapped 1:1 onto x264 `-preset` names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderPreset {
    UltraFast,
    Medium,
    Slow,
    VerySlow,
}

impl EncoderPreset {
    pub fn as_x264(self) -> &'static str {
        match self {
            EncoderPreset::UltraFast => "ultrafast",
            EncoderPreset::Medium    => "medium",
            EncoderPreset::Slow      => "slow",
            EncoderPreset::VerySlow  => "veryslow",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityProfile {
    /// Look up a profile by its name. Unknown names fall back to `High`.
    ///
    /// ```
    /// use clipforge_core::quality::QualityProfile;
    /// assert_eq!(QualityProfile::from_name("LOW"),   QualityProfile::Low);
    /// assert_eq!(QualityProfile::from_name("weird"), QualityProfile::High);
    /// ```
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "low"    => QualityProfile::Low,
            "medium" => QualityProfile::Medium,
            "high"   => QualityProfile::High,
            "ultra"  => QualityProfile::Ultra,
            other    => {
                log::warn!("[export] unknown quality profile '{other}', using 'high'");
                QualityProfile::High
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityProfile::Low    => "low",
            QualityProfile::Medium => "medium",
            QualityProfile::High   => "high",
            QualityProfile::Ultra  => "ultra",
        }
    }

    /// (bitrate kbps, fps, preset)
    pub fn settings(self) -> (u32, u32, EncoderPreset) {
        match self {
            QualityProfile::Low    => (1_000,  24, EncoderPreset::UltraFast),
            QualityProfile::Medium => (5_000,  30, EncoderPreset::Medium),
            QualityProfile::High   => (10_000, 30, EncoderPreset::Slow),
            QualityProfile::Ultra  => (20_000, 60, EncoderPreset::VerySlow),
        }
    }

    pub fn params(self) -> EncodeParams {
        let (video_bitrate_kbps, fps, preset) = self.settings();
        EncodeParams {
            codec: "libx264".into(),
            video_bitrate_kbps,
            audio_bitrate_kbps: AUDIO_BITRATE_KBPS,
            fps,
            preset,
            width:  None,
            height: None,
        }
    }
}

/// Fully resolved encoder configuration for one export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodeParams {
    pub codec:              String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// Output frame rate (integer; fractional rates are not needed for export).
    pub fps:                u32,
    pub preset:             EncoderPreset,
    /// Output size. `None` = use the composited canvas size.
    pub width:              Option<u32>,
    pub height:             Option<u32>,
}

impl EncodeParams {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width  = Some(width);
        self.height = Some(height);
        self
    }

    /// Seconds per output frame.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

impl Default for EncodeParams {
    fn default() -> Self {
        QualityProfile::High.params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_table_matches_profiles() {
        let low = QualityProfile::Low.params();
        assert_eq!((low.video_bitrate_kbps, low.fps, low.preset.as_x264()), (1000, 24, "ultrafast"));
        let med = QualityProfile::Medium.params();
        assert_eq!((med.video_bitrate_kbps, med.fps, med.preset.as_x264()), (5000, 30, "medium"));
        let high = QualityProfile::High.params();
        assert_eq!((high.video_bitrate_kbps, high.fps, high.preset.as_x264()), (10000, 30, "slow"));
        let ultra = QualityProfile::Ultra.params();
        assert_eq!((ultra.video_bitrate_kbps, ultra.fps, ultra.preset.as_x264()), (20000, 60, "veryslow"));
    }

    #[test]
    fn unknown_name_defaults_to_high() {
        assert_eq!(QualityProfile::from_name(""), QualityProfile::High);
        assert_eq!(QualityProfile::from_name("4k"), QualityProfile::High);
        assert_eq!(EncodeParams::default(), QualityProfile::High.params());
    }

    #[test]
    fn names_round_trip() {
        for p in [QualityProfile::Low, QualityProfile::Medium, QualityProfile::High, QualityProfile::Ultra] {
            assert_eq!(QualityProfile::from_name(p.name()), p);
        }
    }
}
