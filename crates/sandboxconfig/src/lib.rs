//! On-disk configuration for the fragbox sandbox.
//!
//! Every field is optional; command-line flags override whatever the file
//! provides. Relative paths are resolved against the file's directory by
//! [`SandboxConfig::load`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    #[serde(default)]
    pub shader: Option<PathBuf>,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default = "default_size")]
    pub size: [u32; 2],
    /// Reload the shader when its file changes on disk.
    #[serde(default = "default_watch")]
    pub watch: bool,
    /// Quiet period after a file event before reloading; bursts of events
    /// from one save collapse into a single reload.
    #[serde(
        default = "default_watch_debounce",
        deserialize_with = "deserialize_duration"
    )]
    pub watch_debounce: Duration,
    #[serde(default = "default_param_step")]
    pub param_step: f32,
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub wrap: WrapConfig,
}

/// Initial values of the four live parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WrapConfig {
    #[serde(deserialize_with = "deserialize_wrap")]
    pub x: WrapSetting,
    #[serde(deserialize_with = "deserialize_wrap")]
    pub y: WrapSetting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WrapSetting {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

impl WrapSetting {
    /// Selector `1` is clamp, `2` is mirror, anything else is repeat.
    pub fn from_selector(selector: i64) -> Self {
        match selector {
            1 => Self::Clamp,
            2 => Self::Mirror,
            _ => Self::Repeat,
        }
    }
}

impl fmt::Display for WrapSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repeat => f.write_str("repeat"),
            Self::Clamp => f.write_str("clamp"),
            Self::Mirror => f.write_str("mirror"),
        }
    }
}

fn default_size() -> [u32; 2] {
    [1280, 720]
}

fn default_watch() -> bool {
    true
}

fn default_watch_debounce() -> Duration {
    Duration::from_millis(100)
}

fn default_param_step() -> f32 {
    0.05
}

fn default_vsync() -> bool {
    true
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            shader: None,
            image: None,
            size: default_size(),
            watch: default_watch(),
            watch_debounce: default_watch_debounce(),
            param_step: default_param_step(),
            vsync: default_vsync(),
            params: Params::default(),
            wrap: WrapConfig::default(),
        }
    }
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
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_wrap<'de, D>(deserializer: D) -> Result<WrapSetting, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Str(raw) => parse_wrap(&raw).map_err(de::Error::custom),
        Helper::Num(selector) => Ok(WrapSetting::from_selector(selector)),
    }
}

/// Accepts `repeat`, `clamp`, `mirror` (plus long forms) or a numeric selector.
pub fn parse_wrap(raw: &str) -> Result<WrapSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    if let Ok(selector) = normalized.parse::<i64>() {
        return Ok(WrapSetting::from_selector(selector));
    }
    match normalized.as_str() {
        "repeat" => Ok(WrapSetting::Repeat),
        "clamp" | "clamp-to-edge" | "clamp_to_edge" => Ok(WrapSetting::Clamp),
        "mirror" | "mirrored-repeat" | "mirrored_repeat" => Ok(WrapSetting::Mirror),
        other => Err(format!(
            "invalid wrap mode '{other}'; expected repeat, clamp, mirror, or 0/1/2"
        )),
    }
}

impl SandboxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SandboxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`, resolving relative asset paths against
    /// the directory containing it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for slot in [&mut self.shader, &mut self.image] {
            if let Some(path) = slot.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    /// Debounce for the shader file watcher, `None` when `watch = false`.
    pub fn watch_debounce(&self) -> Option<Duration> {
        self.watch.then_some(self.watch_debounce)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let [width, height] = self.size;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "size must be non-zero, got {width}x{height}"
            )));
        }

        if !self.param_step.is_finite() || self.param_step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "param_step must be a positive number, got {}",
                self.param_step
            )));
        }

        let Params { x, y, z, w } = self.params;
        for (name, value) in [("x", x), ("y", y), ("z", z), ("w", w)] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "params.{name} must be finite"
                )));
            }
        }

        for (name, path) in [("shader", &self.shader), ("image", &self.image)] {
            if path
                .as_ref()
                .is_some_and(|path| path.as_os_str().is_empty())
            {
                return Err(ConfigError::Invalid(format!("{name} path may not be empty")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
shader = "shaders/passthrough.frag"
image = "assets/photo.png"
size = [800, 600]
watch_debounce = "250ms"
param_step = 0.1
vsync = false

[params]
x = 0.5
w = 0.25

[wrap]
x = "mirror"
y = 1
"#;

    #[test]
    fn parses_sample_config() {
        let config = SandboxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(
            config.shader.as_deref(),
            Some(Path::new("shaders/passthrough.frag"))
        );
        assert_eq!(config.size, [800, 600]);
        assert_eq!(config.watch_debounce(), Some(Duration::from_millis(250)));
        assert_eq!(config.param_step, 0.1);
        assert!(!config.vsync);
        assert_eq!(
            config.params,
            Params {
                x: 0.5,
                y: 0.0,
                z: 0.0,
                w: 0.25
            }
        );
        assert_eq!(config.wrap.x, WrapSetting::Mirror);
        assert_eq!(config.wrap.y, WrapSetting::Clamp);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = SandboxConfig::from_toml_str("").expect("parse config");
        assert_eq!(config, SandboxConfig::default());
        assert_eq!(config.params.w, 1.0);
    }

    #[test]
    fn watching_can_be_switched_off() {
        let config = SandboxConfig::from_toml_str("watch = false").unwrap();
        assert_eq!(config.watch_debounce(), None);

        let config = SandboxConfig::from_toml_str("watch_debounce = 0").unwrap();
        assert_eq!(config.watch_debounce(), Some(Duration::ZERO));
    }

    #[test]
    fn unknown_selectors_fall_back_to_repeat() {
        let config = SandboxConfig::from_toml_str("[wrap]\nx = 7\ny = \"-3\"").unwrap();
        assert_eq!(config.wrap.x, WrapSetting::Repeat);
        assert_eq!(config.wrap.y, WrapSetting::Repeat);
    }

    #[test]
    fn rejects_unknown_wrap_name() {
        let err = SandboxConfig::from_toml_str("[wrap]\nx = \"tile\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_size_and_bad_step() {
        let err = SandboxConfig::from_toml_str("size = [0, 10]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = SandboxConfig::from_toml_str("param_step = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "shader = \"a.frag\"\nimage = \"/abs/b.png\"\n").unwrap();

        let config = SandboxConfig::load(&path).unwrap();
        assert_eq!(config.shader, Some(dir.path().join("a.frag")));
        assert_eq!(config.image, Some(PathBuf::from("/abs/b.png")));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SandboxConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
