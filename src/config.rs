use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::motion::{BlockMatchConfig, EstimatorKind, MotionConfig, PyramidalLkConfig};
use crate::pipeline::Thresholds;
use crate::session::SessionConfig;

const DEFAULT_SUBJECT: &str = "visitor";
const DEFAULT_SOURCE_URI: &str = "stub://walk";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
pub const DEFAULT_MAX_CONSECUTIVE_UNAVAILABLE: u32 = 30;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackerConfigFile {
    subject: Option<String>,
    source: Option<SourceConfigFile>,
    motion: Option<MotionConfigFile>,
    detector: Option<DetectorConfigFile>,
    session: Option<SessionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    mirror: Option<bool>,
    noise: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotionConfigFile {
    estimator: Option<EstimatorKind>,
    pyramid_levels: Option<u32>,
    window_radius: Option<u32>,
    iterations: Option<u32>,
    min_eigenvalue: Option<f32>,
    block_size: Option<u32>,
    search_range: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    significance_threshold: Option<f32>,
    flow_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SessionConfigFile {
    max_consecutive_unavailable: Option<u32>,
}

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Name used in the human-readable event messages.
    pub subject: String,
    pub source: SourceSettings,
    pub motion: MotionConfig,
    pub thresholds: Thresholds,
    pub max_consecutive_unavailable: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub uri: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Flip frames horizontally before analysis and display.
    pub mirror: bool,
    /// Sensor noise amplitude for synthetic sources.
    pub noise: u8,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            uri: DEFAULT_SOURCE_URI.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
            mirror: true,
            noise: 0,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            source: SourceSettings::default(),
            motion: MotionConfig::default(),
            thresholds: Thresholds::default(),
            max_consecutive_unavailable: DEFAULT_MAX_CONSECUTIVE_UNAVAILABLE,
        }
    }
}

impl TrackerConfig {
    /// Load from `CROSSLINE_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CROSSLINE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: TrackerConfigFile = toml::from_str(raw).context("invalid TOML config")?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Self {
        let defaults = Self::default();
        let source = file.source.unwrap_or_default();
        let motion = file.motion.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let session = file.session.unwrap_or_default();

        let lk_defaults = PyramidalLkConfig::default();
        let bm_defaults = BlockMatchConfig::default();

        Self {
            subject: file.subject.unwrap_or(defaults.subject),
            source: SourceSettings {
                uri: source.uri.unwrap_or(defaults.source.uri),
                target_fps: source.target_fps.unwrap_or(defaults.source.target_fps),
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
                mirror: source.mirror.unwrap_or(defaults.source.mirror),
                noise: source.noise.unwrap_or(defaults.source.noise),
            },
            motion: MotionConfig {
                kind: motion.estimator.unwrap_or_default(),
                pyramidal_lk: PyramidalLkConfig {
                    levels: motion.pyramid_levels.unwrap_or(lk_defaults.levels),
                    window_radius: motion.window_radius.unwrap_or(lk_defaults.window_radius),
                    iterations: motion.iterations.unwrap_or(lk_defaults.iterations),
                    min_eigenvalue: motion.min_eigenvalue.unwrap_or(lk_defaults.min_eigenvalue),
                },
                block_match: BlockMatchConfig {
                    block_size: motion.block_size.unwrap_or(bm_defaults.block_size),
                    search_range: motion.search_range.unwrap_or(bm_defaults.search_range),
                },
            },
            thresholds: Thresholds {
                significance: detector
                    .significance_threshold
                    .unwrap_or(defaults.thresholds.significance),
                flow: detector.flow_threshold.unwrap_or(defaults.thresholds.flow),
            },
            max_consecutive_unavailable: session
                .max_consecutive_unavailable
                .unwrap_or(defaults.max_consecutive_unavailable),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("CROSSLINE_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(subject) = std::env::var("CROSSLINE_SUBJECT") {
            if !subject.trim().is_empty() {
                self.subject = subject;
            }
        }
        if let Ok(estimator) = std::env::var("CROSSLINE_ESTIMATOR") {
            if !estimator.trim().is_empty() {
                self.motion.kind = estimator
                    .parse()
                    .context("CROSSLINE_ESTIMATOR must name a motion estimator")?;
            }
        }
        if let Ok(value) = std::env::var("CROSSLINE_SIGNIFICANCE_THRESHOLD") {
            self.thresholds.significance = value.trim().parse().map_err(|_| {
                anyhow!("CROSSLINE_SIGNIFICANCE_THRESHOLD must be a number, got '{}'", value)
            })?;
        }
        if let Ok(value) = std::env::var("CROSSLINE_FLOW_THRESHOLD") {
            self.thresholds.flow = value.trim().parse().map_err(|_| {
                anyhow!("CROSSLINE_FLOW_THRESHOLD must be a number, got '{}'", value)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(anyhow!("subject must not be empty"));
        }
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source dimensions must be non-zero, got {}x{}",
                self.source.width,
                self.source.height
            ));
        }
        if self.max_consecutive_unavailable == 0 {
            return Err(anyhow!("max_consecutive_unavailable must be greater than zero"));
        }
        self.motion.validate()?;
        self.thresholds.validate()?;
        Ok(())
    }

    /// Session parameters derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            thresholds: self.thresholds,
            mirror: self.source.mirror,
            max_consecutive_unavailable: self.max_consecutive_unavailable,
        }
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?
    } else {
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() -> Result<()> {
        let cfg = TrackerConfig::from_toml_str("")?;
        assert_eq!(cfg, TrackerConfig::default());
        assert_eq!(cfg.source.uri, "stub://walk");
        assert!(cfg.source.mirror);
        assert_eq!(cfg.motion.kind, EstimatorKind::PyramidalLk);
        Ok(())
    }

    #[test]
    fn parses_every_section() -> Result<()> {
        let cfg = TrackerConfig::from_toml_str(
            r#"
            subject = "alice"
            [source]
            uri = "/srv/frames"
            mirror = false
            noise = 4
            [motion]
            estimator = "block-match"
            block_size = 16
            search_range = 4
            [detector]
            significance_threshold = 1.5
            flow_threshold = 0.75
            [session]
            max_consecutive_unavailable = 5
            "#,
        )?;
        assert_eq!(cfg.subject, "alice");
        assert_eq!(cfg.source.uri, "/srv/frames");
        assert!(!cfg.source.mirror);
        assert_eq!(cfg.source.noise, 4);
        assert_eq!(cfg.motion.kind, EstimatorKind::BlockMatch);
        assert_eq!(cfg.motion.block_match.block_size, 16);
        assert_eq!(cfg.motion.block_match.search_range, 4);
        assert_eq!(cfg.thresholds.significance, 1.5);
        assert_eq!(cfg.thresholds.flow, 0.75);

        let session = cfg.session_config();
        assert_eq!(session.max_consecutive_unavailable, 5);
        assert!(!session.mirror);
        Ok(())
    }

    #[test]
    fn flat_motion_keys_fill_backend_tuning() -> Result<()> {
        let cfg = TrackerConfig::from_toml_str(
            r#"
            [motion]
            pyramid_levels = 2
            window_radius = 5
            iterations = 4
            min_eigenvalue = 0.5
            block_size = 6
            "#,
        )?;
        assert_eq!(cfg.motion.kind, EstimatorKind::PyramidalLk);
        assert_eq!(
            cfg.motion.pyramidal_lk,
            PyramidalLkConfig {
                levels: 2,
                window_radius: 5,
                iterations: 4,
                min_eigenvalue: 0.5,
            }
        );
        assert_eq!(cfg.motion.block_match.block_size, 6);
        assert_eq!(
            cfg.motion.block_match.search_range,
            BlockMatchConfig::default().search_range
        );
        Ok(())
    }

    #[test]
    fn rejects_invalid_values() {
        for doc in [
            "[detector]\nflow_threshold = 0.0",
            "[detector]\nsignificance_threshold = -1.0",
            "[motion]\nwindow_radius = 0",
            "[session]\nmax_consecutive_unavailable = 0",
            "[source]\nwidth = 0",
            "subject = \" \"",
            "[motion]\nestimator = \"farneback\"",
            "[source]\nunknown_key = 1",
        ] {
            assert!(TrackerConfig::from_toml_str(doc).is_err(), "accepted: {}", doc);
        }
    }
}
