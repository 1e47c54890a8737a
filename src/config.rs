use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::ClassSet;
use crate::render::{find_system_font, OverlayFont};

const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_OUT_DIR: &str = "fallwatch_out";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_MAX_WIDTH: u32 = 320;
const DEFAULT_JPEG_QUALITY: u8 = 50;
const DEFAULT_CONF_THRESHOLD: f32 = 0.4;
const DEFAULT_PERSISTENCE_SECS: f64 = 2.0;
const DEFAULT_ALPHA: f32 = 0.6;
const DEFAULT_BLINK_MS: u64 = 500;

/// What the state machine does on a tick where no sample could be produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoSignalPolicy {
    /// Leave the persistence window untouched and repeat the last decision.
    #[default]
    Hold,
    /// Treat the missing sample like a frame with no qualifying detection.
    Reset,
}

impl std::str::FromStr for NoSignalPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hold" => Ok(Self::Hold),
            "reset" => Ok(Self::Reset),
            other => Err(anyhow!("unknown no-signal policy '{}'", other)),
        }
    }
}

/// Relative sizes of the alert chrome.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayProportions {
    /// Border thickness as a fraction of frame width.
    pub border: f32,
    /// Top bar height as a fraction of frame height.
    pub top_bar: f32,
    /// Bottom stripe bar height as a fraction of frame height.
    pub stripe: f32,
    pub stripe_count: u32,
    /// Filled share of each stripe segment.
    pub stripe_fill: f32,
    /// Gap between the warning text and each exclamation glyph, as a fraction of width.
    pub glyph_offset: f32,
}

impl Default for OverlayProportions {
    fn default() -> Self {
        Self {
            border: 0.01,
            top_bar: 0.15,
            stripe: 0.05,
            stripe_count: 5,
            stripe_fill: 0.7,
            glyph_offset: 0.08,
        }
    }
}

/// Options shared by the persistence state machine and the overlay renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Detections must be strictly above this to qualify or be drawn.
    pub conf_threshold: f32,
    pub persistence_threshold: Duration,
    pub proportions: OverlayProportions,
    /// Weight of the chrome layer in the final blend.
    pub alpha_blend: f32,
    pub qualifying_classes: ClassSet,
    pub no_signal: NoSignalPolicy,
    /// Font for the warning text and labels. Text is skipped when unset.
    pub font: Option<OverlayFont>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            persistence_threshold: Duration::from_secs_f64(DEFAULT_PERSISTENCE_SECS),
            proportions: OverlayProportions::default(),
            alpha_blend: DEFAULT_ALPHA,
            qualifying_classes: ClassSet::default(),
            no_signal: NoSignalPolicy::default(),
            font: None,
        }
    }
}

impl RenderConfig {
    /// True when `class` at `confidence` counts toward the persistence window.
    pub fn qualifies(&self, class: &str, confidence: f32) -> bool {
        confidence > self.conf_threshold && self.qualifying_classes.contains(class)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.conf_threshold >= 0.0 && self.conf_threshold < 1.0) {
            return Err(anyhow!("confidence threshold must be within [0, 1)"));
        }
        if self.persistence_threshold.is_zero() {
            return Err(anyhow!("persistence threshold must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.alpha_blend) {
            return Err(anyhow!("alpha blend must be within [0, 1]"));
        }
        if self.qualifying_classes.is_empty() {
            return Err(anyhow!("at least one qualifying class is required"));
        }
        let p = &self.proportions;
        for (name, value) in [
            ("border", p.border),
            ("top_bar", p.top_bar),
            ("stripe", p.stripe),
            ("stripe_fill", p.stripe_fill),
            ("glyph_offset", p.glyph_offset),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(anyhow!("overlay proportion {} must be within (0, 1)", name));
            }
        }
        if p.stripe_count == 0 {
            return Err(anyhow!("stripe count must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct FallwatchConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    max_width: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    script_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    class_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    conf_threshold: Option<f32>,
    persistence_secs: Option<f64>,
    alpha_blend: Option<f32>,
    qualifying_classes: Option<ClassSet>,
    no_signal: Option<NoSignalPolicy>,
    blink_ms: Option<u64>,
    proportions: Option<OverlayProportions>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FallwatchConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
    pub render: RenderConfig,
    pub blink_period: Duration,
    /// TrueType font for overlay text. A system font is tried when unset.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    /// Frames wider than this are downscaled before detection.
    pub max_width: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DetectorSettings {
    pub script_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub jpeg_quality: u8,
}

impl FallwatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FALLWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        cfg.render.font = cfg.load_font()?;
        Ok(cfg)
    }

    /// Load the configured font, or the first system font found.
    ///
    /// A configured font that cannot be loaded is an error. Without any font
    /// the overlay is drawn without text.
    pub fn load_font(&self) -> Result<Option<OverlayFont>> {
        if let Some(path) = &self.font_path {
            let font = OverlayFont::from_path(path)?;
            log::info!("overlay font: {}", font.source());
            return Ok(Some(font));
        }
        match find_system_font() {
            Some(path) => match OverlayFont::from_path(&path) {
                Ok(font) => {
                    log::info!("overlay font: {} (system default)", font.source());
                    Ok(Some(font))
                }
                Err(err) => {
                    log::warn!("ignoring system font {}: {:#}", path.display(), err);
                    Ok(None)
                }
            },
            None => {
                log::warn!("no overlay font configured; warning text and labels will not be drawn");
                Ok(None)
            }
        }
    }

    fn from_file(file: FallwatchConfigFile) -> Result<Self> {
        let source = SourceSettings {
            url: file
                .source
                .as_ref()
                .and_then(|source| source.url.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            max_width: file
                .source
                .as_ref()
                .and_then(|source| source.max_width)
                .unwrap_or(DEFAULT_MAX_WIDTH),
        };
        let detector = file
            .detector
            .map(|detector| DetectorSettings {
                script_path: detector.script_path,
                model_path: detector.model_path,
                class_names: detector.class_names.unwrap_or_default(),
            })
            .unwrap_or_default();
        let output = OutputSettings {
            dir: file
                .output
                .as_ref()
                .and_then(|output| output.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
            jpeg_quality: file
                .output
                .as_ref()
                .and_then(|output| output.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        };

        let alert = file.alert.unwrap_or_default();
        let font_path = alert.font_path.clone();
        let defaults = RenderConfig::default();
        let persistence_secs = alert.persistence_secs.unwrap_or(DEFAULT_PERSISTENCE_SECS);
        let render = RenderConfig {
            conf_threshold: alert.conf_threshold.unwrap_or(defaults.conf_threshold),
            persistence_threshold: secs_to_duration(persistence_secs)?,
            proportions: alert.proportions.unwrap_or(defaults.proportions),
            alpha_blend: alert.alpha_blend.unwrap_or(defaults.alpha_blend),
            qualifying_classes: alert
                .qualifying_classes
                .unwrap_or(defaults.qualifying_classes),
            no_signal: alert.no_signal.unwrap_or(defaults.no_signal),
            font: None,
        };
        let blink_period = Duration::from_millis(alert.blink_ms.unwrap_or(DEFAULT_BLINK_MS));

        Ok(Self {
            source,
            detector,
            output,
            render,
            blink_period,
            font_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FALLWATCH_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(dir) = std::env::var("FALLWATCH_OUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(threshold) = std::env::var("FALLWATCH_CONF_THRESHOLD") {
            self.render.conf_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("FALLWATCH_CONF_THRESHOLD must be a number"))?;
        }
        if let Ok(secs) = std::env::var("FALLWATCH_PERSISTENCE_SECS") {
            let secs: f64 = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("FALLWATCH_PERSISTENCE_SECS must be a number of seconds"))?;
            self.render.persistence_threshold = secs_to_duration(secs)?;
        }
        if let Ok(classes) = std::env::var("FALLWATCH_QUALIFYING_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.render.qualifying_classes = ClassSet::new(parsed);
            }
        }
        if let Ok(policy) = std::env::var("FALLWATCH_NO_SIGNAL") {
            if !policy.trim().is_empty() {
                self.render.no_signal = policy.parse()?;
            }
        }
        if let Ok(quality) = std::env::var("FALLWATCH_JPEG_QUALITY") {
            self.output.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("FALLWATCH_JPEG_QUALITY must be an integer"))?;
        }
        if let Ok(path) = std::env::var("FALLWATCH_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(width) = std::env::var("FALLWATCH_MAX_WIDTH") {
            self.source.max_width = width
                .trim()
                .parse()
                .map_err(|_| anyhow!("FALLWATCH_MAX_WIDTH must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.render.validate()?;
        if self.source.target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        if self.source.max_width == 0 {
            return Err(anyhow!("max width must be greater than zero"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(anyhow!("jpeg quality must be within 1..=100"));
        }
        if self.blink_period.is_zero() {
            return Err(anyhow!("blink period must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for FallwatchConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings {
                url: DEFAULT_SOURCE.to_string(),
                target_fps: DEFAULT_TARGET_FPS,
                max_width: DEFAULT_MAX_WIDTH,
            },
            detector: DetectorSettings::default(),
            output: OutputSettings {
                dir: PathBuf::from(DEFAULT_OUT_DIR),
                jpeg_quality: DEFAULT_JPEG_QUALITY,
            },
            render: RenderConfig::default(),
            blink_period: Duration::from_millis(DEFAULT_BLINK_MS),
            font_path: None,
        }
    }
}

fn read_config_file(path: &Path) -> Result<FallwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn secs_to_duration(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("persistence threshold must be a positive number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
