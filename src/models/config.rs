use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User settings from `Pagesmith Settings.yaml`
///
/// Every field has a default, so a partial (or missing) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How long a notification stays visible
    pub notification_ttl_ms: u64,

    /// Thumbnail size relative to the source image
    pub thumbnail_scale: f32,

    /// JPEG quality (1-100) for image thumbnails
    pub thumbnail_quality: u8,

    /// Capacity of the state change broadcast channel
    pub event_buffer: usize,

    pub output_dir: String,
    pub log_dir: String,
    pub debug_mode: bool,
    pub json_logs: bool,

    /// How long the CLI waits for background work before giving up
    pub wait_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notification_ttl_ms: 4000,
            thumbnail_scale: 0.25,
            thumbnail_quality: 70,
            event_buffer: 100,
            output_dir: "output".to_string(),
            log_dir: "logs".to_string(),
            debug_mode: false,
            json_logs: false,
            wait_timeout_secs: 120,
        }
    }
}

impl Settings {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Thumbnail scale clamped to a usable range
    pub fn effective_thumbnail_scale(&self) -> f32 {
        if self.thumbnail_scale.is_finite() {
            self.thumbnail_scale.clamp(0.01, 1.0)
        } else {
            0.25
        }
    }

    /// JPEG quality clamped to 1..=100
    pub fn effective_thumbnail_quality(&self) -> u8 {
        self.thumbnail_quality.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.notification_ttl(), Duration::from_secs(4));
        assert_eq!(settings.event_buffer, 100);
        assert_eq!(settings.output_dir, "output");
        assert!(!settings.debug_mode);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let settings: Settings = serde_yaml_ng::from_str("debug_mode: true\nthumbnail_quality: 90\n").unwrap();
        assert!(settings.debug_mode);
        assert_eq!(settings.thumbnail_quality, 90);
        assert_eq!(settings.wait_timeout_secs, 120);
    }

    #[test]
    fn test_effective_values_are_clamped() {
        let settings = Settings {
            thumbnail_scale: 5.0,
            thumbnail_quality: 0,
            ..Settings::default()
        };
        assert_eq!(settings.effective_thumbnail_scale(), 1.0);
        assert_eq!(settings.effective_thumbnail_quality(), 1);

        let settings = Settings {
            thumbnail_scale: f32::NAN,
            ..Settings::default()
        };
        assert_eq!(settings.effective_thumbnail_scale(), 0.25);
    }
}
