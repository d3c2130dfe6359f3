use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facewatch_core::{
    load_known_faces, EnrollmentReport, FaceAnalyzer, NearestMatcher, OnnxAnalyzer, Registry,
};
use facewatch_hw::Camera;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod render;
mod viewer;

use config::Config;
use engine::RecognitionLoop;
use render::Renderer;
use viewer::MinifbViewer;

#[derive(Parser)]
#[command(name = "facewatch", about = "Live webcam face recognition against a folder of known faces")]
struct Cli {
    /// Folder of `<name>.jpg|jpeg|png` reference images
    #[arg(long, global = true)]
    known_faces: Option<PathBuf>,
    /// Capture device index (0 = /dev/video0)
    #[arg(long, global = true)]
    camera: Option<u32>,
    /// Maximum embedding distance accepted as a match
    #[arg(long, global = true)]
    tolerance: Option<f32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize faces on the live camera feed (default)
    Watch,
    /// Enroll the known-faces folder and print the result
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List video capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.known_faces {
        config.known_faces_dir = dir;
    }
    if let Some(index) = cli.camera {
        config.camera_index = index;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    tracing::debug!(?config, "configuration resolved");

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&config),
        Commands::List { json } => list(&config, json),
        Commands::Devices => {
            devices();
            Ok(())
        }
    }
}

fn load_analyzer(config: &Config) -> Result<OnnxAnalyzer> {
    OnnxAnalyzer::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .with_context(|| format!("failed to load face models from {}", config.model_dir.display()))
}

fn watch(config: &Config) -> Result<()> {
    let mut analyzer = load_analyzer(config)?;
    let Some(registry) =
        enroll_for_watch(&config.known_faces_dir, &mut analyzer, &mut std::io::stdout())?
    else {
        return Ok(());
    };

    let camera = Camera::open(config.camera_index)?;
    let mut stream = camera.stream()?;
    let mut viewer = MinifbViewer::new(&config.window_title);

    println!("Starting video stream. Press 'q' to exit.");

    let mut recognition = RecognitionLoop::new(
        analyzer,
        registry,
        NearestMatcher::new(config.tolerance),
        Renderer::load(config.font_path.as_deref()),
    );
    recognition.run(&mut stream, &mut viewer)?;

    Ok(())
}

/// Enroll `dir` ahead of a live session.
///
/// Returns `None` after telling the user on `out` when nobody was enrolled,
/// in which case no session should start.
fn enroll_for_watch<A, W>(dir: &Path, analyzer: &mut A, out: &mut W) -> Result<Option<Registry>>
where
    A: FaceAnalyzer + ?Sized,
    W: Write,
{
    let (registry, _report) = load_known_faces(dir, analyzer)?;
    if registry.is_empty() {
        writeln!(
            out,
            "No known faces found. Please add images to the '{}' folder.",
            dir.display()
        )?;
        return Ok(None);
    }
    Ok(Some(registry))
}

/// Machine-readable output of `facewatch list --json`.
#[derive(Debug, Serialize)]
struct ListReport {
    folder: String,
    enrolled: Vec<EnrolledEntry>,
    skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Serialize)]
struct EnrolledEntry {
    name: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct SkippedEntry {
    file: String,
    reason: String,
}

impl ListReport {
    fn new(dir: &Path, registry: &Registry, report: &EnrollmentReport) -> Self {
        Self {
            folder: dir.display().to_string(),
            enrolled: registry
                .iter()
                .map(|(name, embedding)| EnrolledEntry {
                    name: name.to_string(),
                    dimensions: embedding.values.len(),
                })
                .collect(),
            skipped: report
                .skipped
                .iter()
                .map(|s| SkippedEntry {
                    file: s.file.clone(),
                    reason: s.reason.to_string(),
                })
                .collect(),
        }
    }
}

fn list(config: &Config, json: bool) -> Result<()> {
    let mut analyzer = load_analyzer(config)?;
    let (registry, report) = load_known_faces(&config.known_faces_dir, &mut analyzer)?;

    if json {
        let out = ListReport::new(&config.known_faces_dir, &registry, &report);
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} enrolled from {}:",
        registry.len(),
        config.known_faces_dir.display()
    );
    for name in registry.names() {
        println!("  {name}");
    }
    if !report.skipped.is_empty() {
        println!("{} skipped:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.file, skipped.reason);
        }
    }
    Ok(())
}

fn devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found");
        return;
    }
    for d in devices {
        println!("{}  {}  {} ({}, {})", d.index, d.path, d.name, d.driver, d.bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facewatch_core::{AnalyzerError, BoundingBox, Embedding};
    use image::{Rgb, RgbImage};

    /// Sees one face in any image whose top-left pixel is not black.
    struct CornerAnalyzer;

    impl FaceAnalyzer for CornerAnalyzer {
        fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            if *image.get_pixel(0, 0) == Rgb([0, 0, 0]) {
                return Ok(Vec::new());
            }
            Ok(vec![BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                confidence: 1.0,
                landmarks: None,
            }])
        }

        fn encode(
            &mut self,
            image: &RgbImage,
            faces: &[BoundingBox],
        ) -> Result<Vec<Embedding>, AnalyzerError> {
            let Rgb([r, g, b]) = *image.get_pixel(0, 0);
            Ok(faces
                .iter()
                .map(|_| Embedding::new(vec![r as f32, g as f32, b as f32]))
                .collect())
        }

        fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
            a.euclidean_distance(b)
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("facewatch-main-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_empty_folder_announces_and_does_not_start() {
        let dir = scratch_dir("empty");
        let mut out = Vec::new();

        let registry = enroll_for_watch(&dir, &mut CornerAnalyzer, &mut out).unwrap();

        assert!(registry.is_none());
        let message = String::from_utf8(out).unwrap();
        assert!(message.starts_with("No known faces found. Please add images to the '"));
        assert!(message.contains(&dir.display().to_string()));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_only_faceless_images_does_not_start() {
        let dir = scratch_dir("faceless");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
            .save(dir.join("blank.png"))
            .unwrap();
        let mut out = Vec::new();

        let registry = enroll_for_watch(&dir, &mut CornerAnalyzer, &mut out).unwrap();

        assert!(registry.is_none());
        assert!(!out.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_enrolled_face_starts_silently() {
        let dir = scratch_dir("alice");
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))
            .save(dir.join("alice.png"))
            .unwrap();
        let mut out = Vec::new();

        let registry = enroll_for_watch(&dir, &mut CornerAnalyzer, &mut out)
            .unwrap()
            .unwrap();

        assert_eq!(registry.names(), ["alice".to_string()]);
        assert!(out.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_list_report_json_shape() {
        let dir = scratch_dir("list");
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))
            .save(dir.join("alice.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
            .save(dir.join("blank.png"))
            .unwrap();
        let (registry, report) = load_known_faces(&dir, &mut CornerAnalyzer).unwrap();

        let value = serde_json::to_value(ListReport::new(&dir, &registry, &report)).unwrap();

        assert_eq!(value["enrolled"][0]["name"], "alice");
        assert_eq!(value["enrolled"][0]["dimensions"], 3);
        assert_eq!(value["skipped"][0]["file"], "blank.png");
        assert_eq!(value["skipped"][0]["reason"], "no face found");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
