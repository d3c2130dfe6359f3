use anyhow::{Context, Result};
use facewatch_core::{ARCFACE_MODEL_FILE, DEFAULT_TOLERANCE, SCRFD_MODEL_FILE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration.
///
/// Layered: built-in defaults, then an optional TOML file named by
/// `FACEWATCH_CONFIG`, then `FACEWATCH_*` environment variables, then CLI flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Folder of `<identity>.<ext>` reference images (default: `known_faces`).
    pub known_faces_dir: PathBuf,
    /// Capture device index (default: 0, i.e. `/dev/video0`).
    pub camera_index: u32,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum embedding distance accepted as a match.
    pub tolerance: f32,
    /// TrueType font for labels; system fallbacks are tried when unset.
    pub font_path: Option<PathBuf>,
    pub window_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            known_faces_dir: PathBuf::from("known_faces"),
            camera_index: 0,
            model_dir: facewatch_core::default_model_dir(),
            tolerance: DEFAULT_TOLERANCE,
            font_path: None,
            window_title: "Facial Recognition".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os("FACEWATCH_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Override fields from `FACEWATCH_*` variables looked up through `var`.
    /// Unparseable numeric values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("FACEWATCH_KNOWN_FACES") {
            self.known_faces_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("FACEWATCH_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("FACEWATCH_FONT") {
            self.font_path = Some(PathBuf::from(path));
        }
        self.camera_index = parsed(&var, "FACEWATCH_CAMERA_INDEX").unwrap_or(self.camera_index);
        self.tolerance = parsed(&var, "FACEWATCH_TOLERANCE").unwrap_or(self.tolerance);
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
