//! facewatch-core — enrollment registry, identity matching, and face analysis.
//!
//! Face detection (SCRFD) and embedding (ArcFace) run on ONNX Runtime behind
//! the [`FaceAnalyzer`] trait, so the registry and matching logic can be
//! driven with synthetic embeddings.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod enroll;
pub mod matcher;
pub mod recognizer;
pub mod registry;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use enroll::{load_known_faces, EnrollError, EnrollmentReport, SkipReason};
pub use matcher::{MatchResult, Matcher, NearestMatcher, DEFAULT_TOLERANCE, UNKNOWN};
pub use registry::Registry;
pub use types::{BoundingBox, Embedding, FaceLocation};

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/facewatch/models`, falling back
/// to `~/.local/share/facewatch/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facewatch/models")
}
