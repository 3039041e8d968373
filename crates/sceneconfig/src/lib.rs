use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default, rename = "loop")]
    pub render_loop: LoopSettings,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Shape of the shared graphics context all targets render through.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextSettings {
    #[serde(default = "default_webgl2")]
    pub webgl2: bool,
    #[serde(default = "default_max_texture_size")]
    pub max_texture_size: u32,
    #[serde(default = "default_context_width")]
    pub width: u32,
    #[serde(default = "default_context_height")]
    pub height: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            webgl2: default_webgl2(),
            max_texture_size: default_max_texture_size(),
            width: default_context_width(),
            height: default_context_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoopSettings {
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub frame_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            frame_interval: default_frame_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    pub noise: Option<String>,
    pub wave_intensity: Option<f32>,
    pub wave_scale: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    pub name: String,
    pub image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub noise: Option<String>,
}

/// A target with the scene defaults folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub name: String,
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub active: bool,
    /// `None` means procedural noise.
    pub noise: Option<String>,
    pub wave_intensity: f32,
    pub wave_scale: f32,
}

fn default_webgl2() -> bool {
    true
}

fn default_max_texture_size() -> u32 {
    4096
}

fn default_context_width() -> u32 {
    300
}

fn default_context_height() -> u32 {
    150
}

fn default_frames() -> u32 {
    1
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

fn default_active() -> bool {
    true
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|target| target.name == name)
    }

    pub fn resolved_targets(&self) -> Vec<ResolvedTarget> {
        self.targets
            .iter()
            .map(|target| target.resolve(&self.defaults))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let context = &self.context;
        if context.width == 0 || context.height == 0 {
            return Err(ConfigError::Invalid(
                "context width and height must be greater than zero".into(),
            ));
        }
        if context.max_texture_size == 0 {
            return Err(ConfigError::Invalid(
                "context.max_texture_size must be greater than zero".into(),
            ));
        }

        let render_loop = &self.render_loop;
        if render_loop
            .frame_interval
            .checked_mul(render_loop.frames)
            .is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "loop of {} frames every {:?} overflows",
                render_loop.frames, render_loop.frame_interval
            )));
        }

        if self.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one target".into(),
            ));
        }

        let mut names = BTreeSet::new();
        for target in &self.targets {
            let name = target.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("target name may not be empty".into()));
            }
            if !names.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "target '{name}' is defined more than once"
                )));
            }
            if target.image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "target '{name}' must reference an image"
                )));
            }
            if target.width == 0 || target.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "target '{name}' width and height must be greater than zero"
                )));
            }
        }

        for (key, value) in [
            ("defaults.wave_intensity", self.defaults.wave_intensity),
            ("defaults.wave_scale", self.defaults.wave_scale),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::Invalid(format!("{key} must be >= 0")));
                }
            }
        }

        Ok(())
    }
}

impl TargetConfig {
    pub fn resolve(&self, defaults: &Defaults) -> ResolvedTarget {
        ResolvedTarget {
            name: self.name.clone(),
            image: self.image.clone(),
            width: self.width,
            height: self.height,
            active: self.active,
            noise: self.noise.clone().or_else(|| defaults.noise.clone()),
            wave_intensity: defaults.wave_intensity.unwrap_or(1.0),
            wave_scale: defaults.wave_scale.unwrap_or(1.0),
        }
    }
}
