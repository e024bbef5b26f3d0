//! Configuration management for the Shiori engine

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub context: ContextConfig,
    pub restore: RestoreConfig,
    pub position: PositionConfig,
    pub analysis: AnalysisLimits,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Context-window extraction limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Whole segments gathered on each side of the highlight
    pub segment_depth: usize,
    /// Sentences added on each side of the target sentences
    pub sentence_depth: usize,
    /// Hard ceiling on `context_text`, in chars
    pub char_budget: usize,
}

/// Scroll restoration tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreConfig {
    pub max_attempts: u32,
    /// Fixed convergence threshold in pixels
    pub threshold_px: f64,
    /// Delay between attempts, roughly one animation frame
    pub frame: Duration,
    /// Frames to keep watching for late layout changes after convergence
    pub settle_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionConfig {
    pub debounce: Duration,
}

/// Payload limits enforced by the analysis endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub max_target_length: usize,
    pub max_context_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig {
                base_url: "http://localhost:8010".to_string(),
                timeout: Duration::from_secs(30),
            },
            context: ContextConfig::default(),
            restore: RestoreConfig::default(),
            position: PositionConfig::default(),
            analysis: AnalysisLimits::default(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            segment_depth: 2,
            sentence_depth: 3,
            char_budget: 1200,
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            threshold_px: 5.0,
            frame: Duration::from_millis(16),
            settle_frames: 10,
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
        }
    }
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_target_length: 512,
            max_context_length: 2048,
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            backend: BackendConfig {
                base_url: env::var("SHIORI_BACKEND_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.backend.base_url),
                timeout: Duration::from_secs(parse_var(
                    "SHIORI_HTTP_TIMEOUT_SECS",
                    defaults.backend.timeout.as_secs(),
                )?),
            },
            context: ContextConfig {
                segment_depth: parse_var(
                    "SHIORI_CONTEXT_SEGMENT_DEPTH",
                    defaults.context.segment_depth,
                )?,
                sentence_depth: parse_var(
                    "SHIORI_CONTEXT_SENTENCE_DEPTH",
                    defaults.context.sentence_depth,
                )?,
                char_budget: parse_var("SHIORI_CONTEXT_CHAR_BUDGET", defaults.context.char_budget)?,
            },
            restore: RestoreConfig {
                max_attempts: parse_var("SHIORI_RESTORE_MAX_ATTEMPTS", defaults.restore.max_attempts)?,
                threshold_px: parse_var("SHIORI_RESTORE_THRESHOLD_PX", defaults.restore.threshold_px)?,
                frame: Duration::from_millis(parse_var(
                    "SHIORI_RESTORE_FRAME_MS",
                    defaults.restore.frame.as_millis() as u64,
                )?),
                settle_frames: parse_var(
                    "SHIORI_RESTORE_SETTLE_FRAMES",
                    defaults.restore.settle_frames,
                )?,
            },
            position: PositionConfig {
                debounce: Duration::from_millis(parse_var(
                    "SHIORI_POSITION_DEBOUNCE_MS",
                    defaults.position.debounce.as_millis() as u64,
                )?),
            },
            analysis: AnalysisLimits {
                max_target_length: parse_var(
                    "AI_MAX_TARGET_LENGTH",
                    defaults.analysis.max_target_length,
                )?,
                max_context_length: parse_var(
                    "AI_MAX_CONTEXT_LENGTH",
                    defaults.analysis.max_context_length,
                )?,
            },
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
