//! The face analysis seam: locate faces, embed them, and compare embeddings.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection, embedding, and comparison on RGB images.
pub trait FaceAnalyzer {
    /// Locate all faces in `image`, most confident first.
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// Compute one embedding per face in `faces`, in the same order.
    fn encode(
        &mut self,
        image: &RgbImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError>;

    /// Distance between two embeddings. Smaller = more alike.
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32;

    /// Locate and embed every face in `image`.
    fn embed_all(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, AnalyzerError> {
        let faces = self.locate(image)?;
        self.encode(image, &faces)
    }
}

/// SCRFD detection + ArcFace embedding via ONNX Runtime.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    /// Load both models, failing fast if either is missing.
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(
        &mut self,
        image: &RgbImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError> {
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(AnalyzerError::from))
            .collect()
    }

    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        cosine_distance(a, b)
    }
}

/// Cosine distance `1 - cos(a, b)`, in [0, 2].
///
/// A tolerance of 0.5 accepts pairs with cosine similarity of at least 0.5.
pub fn cosine_distance(a: &Embedding, b: &Embedding) -> f32 {
    1.0 - a.similarity(b)
}
