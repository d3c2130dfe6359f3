//! Enrollment: build the registry from a folder of `<identity>.<ext>` images.

use crate::analyzer::FaceAnalyzer;
use crate::registry::Registry;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image extensions accepted for enrollment (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("cannot read enrollment folder {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why an image was left out of the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoFace,
    Decode(String),
    Analyzer(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFace => write!(f, "no face found"),
            SkipReason::Decode(e) => write!(f, "cannot decode image: {e}"),
            SkipReason::Analyzer(e) => write!(f, "face analysis failed: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub file: String,
    pub reason: SkipReason,
}

/// Per-run enrollment diagnostics.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentReport {
    pub skipped: Vec<SkippedImage>,
}

/// True if `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_enrollable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Identity name for an enrollment image: the file name without its last extension.
pub fn identity_name(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Enroll every image in `dir`.
///
/// Only an unreadable folder is an error. Images that cannot be decoded, that
/// the analyzer fails on, or that contain no face are skipped with a warning.
/// When an image holds several faces, the first one the analyzer reports is used.
pub fn load_known_faces<A>(
    dir: &Path,
    analyzer: &mut A,
) -> Result<(Registry, EnrollmentReport), EnrollError>
where
    A: FaceAnalyzer + ?Sized,
{
    let entries = std::fs::read_dir(dir).map_err(|source| EnrollError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|path| path.is_file() && is_enrollable(path))
        .collect();
    paths.sort();

    let mut registry = Registry::new();
    let mut report = EnrollmentReport::default();

    for path in paths {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(name) = identity_name(&path) else {
            continue;
        };

        match enroll_image(&path, analyzer) {
            Ok(embedding) => {
                tracing::info!(%file, identity = %name, "enrolled face");
                registry.insert(name, embedding);
            }
            Err(reason) => {
                tracing::warn!(%file, %reason, "no face enrolled from {file}");
                report.skipped.push(SkippedImage { file, reason });
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        enrolled = registry.len(),
        skipped = report.skipped.len(),
        "enrollment finished"
    );

    Ok((registry, report))
}

fn enroll_image<A>(path: &Path, analyzer: &mut A) -> Result<crate::Embedding, SkipReason>
where
    A: FaceAnalyzer + ?Sized,
{
    let image = image::open(path)
        .map_err(|e| SkipReason::Decode(e.to_string()))?
        .to_rgb8();

    analyzer
        .embed_all(&image)
        .map_err(|e| SkipReason::Analyzer(e.to_string()))?
        .into_iter()
        .next()
        .ok_or(SkipReason::NoFace)
}
