//! rollcall-core — Face detection, alignment and encoding.
//!
//! Uses SCRFD for detection and ArcFace for encoding, both running via
//! ONNX Runtime on the CPU.

pub mod alignment;
pub mod detector;
pub mod engine;
pub mod recognizer;
pub mod types;

pub use engine::{EngineError, FaceEngine, OnnxFaceEngine};
pub use types::{BoundingBox, CosineThreshold, Embedding, MatchPredicate, DEFAULT_MATCH_THRESHOLD};

use std::path::PathBuf;

/// Default model directory: `$XDG_DATA_HOME/rollcall/models`, falling back to
/// `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
