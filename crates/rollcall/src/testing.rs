//! Test doubles for the camera, the console and the vision engine.

use image::{Rgb, RgbImage};
use rollcall_core::{BoundingBox, Embedding, EngineError, FaceEngine};
use rollcall_hw::{Frame, FrameSource};
use std::collections::VecDeque;
use std::io;
use tempfile::TempDir;

const KEY_STEP: u8 = 60;
const KEY_DIMS: usize = 8;

/// A solid image the `PixelKeyedEngine` reads as a face with identity `key`;
/// key 0 is an image with no face.
pub fn keyed_image(key: u8) -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([key * KEY_STEP, 0, 0]))
}

pub fn keyed_frame(key: u8, sequence: u32) -> Frame {
    Frame::new(keyed_image(key), sequence)
}

/// The embedding `PixelKeyedEngine` produces for `key`.
pub fn keyed_embedding(key: u8) -> Embedding {
    let mut values = vec![0.0; KEY_DIMS];
    values[key as usize % KEY_DIMS] = 1.0;
    Embedding::new(values)
}

/// Reads the identity from the red channel of the top-left pixel, rounded to
/// steps of 60 so JPEG noise does not change it. One full-image face per image.
#[derive(Default)]
pub struct PixelKeyedEngine {
    pub detect_calls: usize,
}

impl PixelKeyedEngine {
    fn key(image: &RgbImage) -> u8 {
        if image.width() == 0 || image.height() == 0 {
            return 0;
        }
        let red = image.get_pixel(0, 0).0[0] as u16;
        ((red + KEY_STEP as u16 / 2) / KEY_STEP as u16) as u8
    }
}

impl FaceEngine for PixelKeyedEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EngineError> {
        self.detect_calls += 1;
        if Self::key(image) == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![BoundingBox {
            x: 2.0,
            y: 2.0,
            width: image.width() as f32 - 4.0,
            height: image.height() as f32 - 4.0,
            confidence: 0.99,
            landmarks: None,
        }])
    }

    fn encode(&mut self, image: &RgbImage, _face: &BoundingBox) -> Result<Embedding, EngineError> {
        Ok(keyed_embedding(Self::key(image)))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("scripted source exhausted")]
pub struct SourceExhausted;

/// Yields pre-built frames, then fails.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    pub delivered: usize,
}

impl ScriptedSource {
    pub fn from_keys(keys: &[u8]) -> Self {
        Self {
            frames: keys
                .iter()
                .enumerate()
                .map(|(i, &k)| keyed_frame(k, i as u32))
                .collect(),
            delivered: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    type Error = SourceExhausted;

    fn next_frame(&mut self) -> Result<Frame, SourceExhausted> {
        let frame = self.frames.pop_front().ok_or(SourceExhausted)?;
        self.delivered += 1;
        Ok(frame)
    }
}

/// Replays canned answers and records every prompt shown.
pub struct ScriptedInput {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

impl crate::prompt::InputProvider for ScriptedInput {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }
}

/// Fresh, empty directory, removed when the guard drops.
pub fn scratch_dir() -> TempDir {
    tempfile::Builder::new().prefix("rollcall-test-").tempdir().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let dir = scratch_dir();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("roster.txt"), "A1,Alice\n").unwrap();
        assert!(path.is_dir());

        drop(dir);
        assert!(!path.exists());
    }
}
