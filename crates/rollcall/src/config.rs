use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Runtime configuration: defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture width; the driver may negotiate something else.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Cosine similarity an observed face must reach against an enrolled one.
    pub match_threshold: f32,
    /// Frames discarded after opening the camera.
    pub warmup_frames: usize,
    /// Capture prompts offered when registering a person.
    pub enroll_captures: usize,
    /// TrueType font for overlay labels; boxes are drawn without labels when unset.
    pub font_path: Option<PathBuf>,
}

/// Every field optional; present values override the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    model_dir: Option<PathBuf>,
    match_threshold: Option<f32>,
    warmup_frames: Option<usize>,
    enroll_captures: Option<usize>,
    font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            model_dir: rollcall_core::default_model_dir(),
            match_threshold: rollcall_core::DEFAULT_MATCH_THRESHOLD,
            warmup_frames: 4,
            enroll_captures: 5,
            font_path: None,
        }
    }
}

impl Config {
    /// Load configuration, reading `file` if given, then applying the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = file {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            config.apply_toml(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(v) = file.camera_device {
            self.camera_device = v;
        }
        if let Some(v) = file.frame_width {
            self.frame_width = v;
        }
        if let Some(v) = file.frame_height {
            self.frame_height = v;
        }
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.match_threshold {
            self.match_threshold = v;
        }
        if let Some(v) = file.warmup_frames {
            self.warmup_frames = v;
        }
        if let Some(v) = file.enroll_captures {
            self.enroll_captures = v;
        }
        if file.font_path.is_some() {
            self.font_path = file.font_path;
        }
        Ok(())
    }

    /// Apply `ROLLCALL_*` overrides. Unparseable numbers are ignored.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = var("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_FONT_PATH") {
            self.font_path = Some(PathBuf::from(v));
        }
        parse_into(&var, "ROLLCALL_FRAME_WIDTH", &mut self.frame_width);
        parse_into(&var, "ROLLCALL_FRAME_HEIGHT", &mut self.frame_height);
        parse_into(&var, "ROLLCALL_MATCH_THRESHOLD", &mut self.match_threshold);
        parse_into(&var, "ROLLCALL_WARMUP_FRAMES", &mut self.warmup_frames);
        parse_into(&var, "ROLLCALL_ENROLL_CAPTURES", &mut self.enroll_captures);
    }
}

fn parse_into<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = var(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}
