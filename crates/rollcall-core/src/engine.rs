use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face locator and encoder.
pub trait FaceEngine {
    /// Locate every face in `image`, highest confidence first.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EngineError>;

    /// Encode one located face.
    fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EngineError>;

    /// Locate and encode every face, keeping box and embedding paired.
    fn faces(&mut self, image: &RgbImage) -> Result<Vec<(BoundingBox, Embedding)>, EngineError> {
        let boxes = self.detect(image)?;
        let mut faces = Vec::with_capacity(boxes.len());
        for face in boxes {
            let embedding = self.encode(image, &face)?;
            faces.push((face, embedding));
        }
        Ok(faces)
    }
}

/// SCRFD + ArcFace running on ONNX Runtime.
pub struct OnnxFaceEngine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEngine {
    /// Load both models from `model_dir`. Fails fast if either file is missing.
    pub fn load(model_dir: &Path) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EngineError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, EngineError> {
        Ok(self.recognizer.extract(image, face)?)
    }
}
