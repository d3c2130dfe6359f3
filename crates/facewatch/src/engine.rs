//! The recognition loop: capture, analyse every other frame, annotate, display.

use crate::render::{Annotation, Renderer};
use crate::viewer::Viewer;
use anyhow::Result;
use facewatch_core::{AnalyzerError, Embedding, FaceAnalyzer, Matcher, NearestMatcher, Registry};
use facewatch_hw::{Frame, FrameSource};
use image::RgbImage;

/// Linear downscale applied before analysis; boxes are scaled back up by the same factor.
pub const DOWNSCALE_FACTOR: u32 = 4;

/// Whether the current frame gets a fresh analysis or reuses the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Detect,
    Skip,
}

impl Phase {
    fn next(self) -> Self {
        match self {
            Phase::Detect => Phase::Skip,
            Phase::Skip => Phase::Detect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The viewer reported the quit key or a closed window.
    UserQuit,
    /// The frame source ran out of frames.
    EndOfStream,
    /// Reading a frame failed.
    CaptureFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_shown: u64,
    pub frames_analyzed: u64,
    pub stop: StopReason,
}

/// Owns the registry and analyzer for the lifetime of the loop.
pub struct RecognitionLoop<A> {
    analyzer: A,
    registry: Registry,
    matcher: NearestMatcher,
    renderer: Renderer,
    phase: Phase,
    annotations: Vec<Annotation>,
    frames_analyzed: u64,
}

impl<A: FaceAnalyzer> RecognitionLoop<A> {
    pub fn new(analyzer: A, registry: Registry, matcher: NearestMatcher, renderer: Renderer) -> Self {
        Self {
            analyzer,
            registry,
            matcher,
            renderer,
            phase: Phase::Detect,
            annotations: Vec::new(),
            frames_analyzed: 0,
        }
    }

    /// Annotation set drawn on the most recent frame, in analysis coordinates.
    #[cfg(test)]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Run until the viewer asks to stop or the source stops yielding frames.
    pub fn run<S, V>(&mut self, source: &mut S, viewer: &mut V) -> Result<LoopStats>
    where
        S: FrameSource + ?Sized,
        V: Viewer + ?Sized,
    {
        let mut frames_shown = 0u64;

        let stop = loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    tracing::warn!(error = %e, "frame capture failed; stopping");
                    break StopReason::CaptureFailed;
                }
            };

            let annotated = self.process(&frame);
            frames_shown += 1;

            if !viewer.show(&annotated)? {
                break StopReason::UserQuit;
            }
        };

        let stats = LoopStats {
            frames_shown,
            frames_analyzed: self.frames_analyzed,
            stop,
        };
        tracing::info!(
            frames_shown = stats.frames_shown,
            frames_analyzed = stats.frames_analyzed,
            stop = ?stats.stop,
            "recognition loop stopped"
        );
        Ok(stats)
    }

    /// Handle one frame: refresh annotations on `Detect` frames, then draw the
    /// current set onto a full-resolution RGB copy.
    pub fn process(&mut self, frame: &Frame) -> RgbImage {
        if self.phase == Phase::Detect {
            self.frames_analyzed += 1;
            self.annotations = match self.analyze(frame) {
                Ok(annotations) => annotations,
                Err(e) => {
                    tracing::warn!(seq = frame.sequence, error = %e, "face analysis failed");
                    Vec::new()
                }
            };
        }
        self.phase = self.phase.next();

        let mut display = frame.to_rgb();
        self.renderer
            .draw(&mut display, &self.annotations, DOWNSCALE_FACTOR as i32);
        display
    }

    /// Detect, embed, and identify every face in a quarter-scale copy of `frame`.
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Annotation>, AnalyzerError> {
        let small = frame.downscale(DOWNSCALE_FACTOR).to_rgb();

        let faces = self.analyzer.locate(&small)?;
        let embeddings = self.analyzer.encode(&small, &faces)?;

        let analyzer = &self.analyzer;
        let distance = |a: &Embedding, b: &Embedding| analyzer.distance(a, b);

        let annotations: Vec<Annotation> = faces
            .iter()
            .zip(embeddings.iter())
            .map(|(face, embedding)| {
                let result = self.matcher.identify(embedding, &self.registry, &distance);
                Annotation {
                    location: face.location(small.width(), small.height()),
                    label: result.label().to_string(),
                }
            })
            .collect();

        tracing::debug!(
            seq = frame.sequence,
            faces = annotations.len(),
            labels = ?annotations.iter().map(|a| a.label.as_str()).collect::<Vec<_>>(),
            "frame analyzed"
        );
        Ok(annotations)
    }
}
