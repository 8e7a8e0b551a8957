use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const DEFAULT_VIDEO_RESOLUTION: &str = "720p";

/// How the video poll loop waits. The default never gives up on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: None,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub api_base: String,
    pub image_model: String,
    pub video_model: String,
    pub video_resolution: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            video_resolution: DEFAULT_VIDEO_RESOLUTION.to_string(),
            request_timeout: Duration::from_secs(90),
            poll: PollPolicy::default(),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Resolves settings through `lookup`, which must return trimmed,
    /// non-empty values or `None`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|raw| raw.trim().parse::<f64>().ok());

        let request_timeout_s = number("CLEARCAST_REQUEST_TIMEOUT")
            .unwrap_or(defaults.request_timeout.as_secs_f64())
            .clamp(5.0, 600.0);
        let interval_s = number("CLEARCAST_POLL_INTERVAL")
            .unwrap_or(defaults.poll.interval.as_secs_f64())
            .clamp(0.05, 60.0);
        let max_wait = number("CLEARCAST_POLL_TIMEOUT")
            .filter(|value| *value > 0.0)
            .map(|value| Duration::from_secs_f64(value.clamp(10.0, 86_400.0)));
        let max_attempts = number("CLEARCAST_POLL_MAX_ATTEMPTS")
            .filter(|value| *value >= 1.0)
            .map(|value| value.round().min(u32::MAX as f64) as u32);

        Self {
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            image_model: lookup("CLEARCAST_IMAGE_MODEL").unwrap_or(defaults.image_model),
            video_model: lookup("CLEARCAST_VIDEO_MODEL").unwrap_or(defaults.video_model),
            video_resolution: lookup("CLEARCAST_VIDEO_RESOLUTION")
                .unwrap_or(defaults.video_resolution),
            request_timeout: Duration::from_secs_f64(request_timeout_s),
            poll: PollPolicy {
                interval: Duration::from_secs_f64(interval_s),
                max_wait,
                max_attempts,
            },
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{GenerationConfig, PollPolicy, DEFAULT_API_BASE, DEFAULT_VIDEO_MODEL};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_poll_every_ten_seconds_without_cap() {
        let config = GenerationConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.video_model, DEFAULT_VIDEO_MODEL);
        assert_eq!(config.video_resolution, "720p");
        assert_eq!(config.poll, PollPolicy::default());
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert!(config.poll.max_wait.is_none());
        assert!(config.poll.max_attempts.is_none());
    }

    #[test]
    fn overrides_are_clamped() {
        let config = GenerationConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("CLEARCAST_REQUEST_TIMEOUT", "1"),
            ("CLEARCAST_POLL_INTERVAL", "120"),
            ("CLEARCAST_POLL_TIMEOUT", "3"),
            ("CLEARCAST_POLL_MAX_ATTEMPTS", "12"),
            ("CLEARCAST_IMAGE_MODEL", "gemini-test-image"),
        ]));
        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.poll.interval, Duration::from_secs(60));
        assert_eq!(config.poll.max_wait, Some(Duration::from_secs(10)));
        assert_eq!(config.poll.max_attempts, Some(12));
        assert_eq!(config.image_model, "gemini-test-image");
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = GenerationConfig::from_lookup(lookup_from(&[
            ("CLEARCAST_POLL_INTERVAL", "soon"),
            ("CLEARCAST_POLL_MAX_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert!(config.poll.max_attempts.is_none());
    }
}
