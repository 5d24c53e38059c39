//! Registering a new person: capture frames on operator cue and keep the ones
//! with a detectable face as reference images.

use crate::prompt::InputProvider;
use rollcall_core::{EngineError, FaceEngine};
use rollcall_hw::FrameSource;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("operator input failed: {0}")]
    Prompt(#[from] std::io::Error),
    #[error("frame capture failed: {0}")]
    Capture(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to create enrollment folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Offer `captures` capture attempts for `name` and save each frame that
/// contains a face as `{name}_{n}.jpg` in `folder`, `n` counting saved frames.
///
/// An attempt with no face is dropped silently and still counts against
/// `captures`, so fewer images than attempts may be written.
pub fn register_person<S: FrameSource>(
    name: &str,
    folder: &Path,
    source: &mut S,
    engine: &mut dyn FaceEngine,
    input: &mut dyn InputProvider,
    captures: usize,
) -> Result<Vec<PathBuf>, EnrollError> {
    let mut kept = Vec::new();
    for attempt in 0..captures {
        input.wait("Press Enter to capture an image...")?;
        let frame = source
            .next_frame()
            .map_err(|e| EnrollError::Capture(Box::new(e)))?;

        if engine.faces(&frame.image)?.is_empty() {
            tracing::debug!(name, attempt, "no face in capture, dropped");
            continue;
        }
        kept.push(frame.image);
    }

    std::fs::create_dir_all(folder).map_err(|source| EnrollError::CreateDir {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut saved = Vec::with_capacity(kept.len());
    for (i, image) in kept.iter().enumerate() {
        let path = folder.join(format!("{name}_{i}.jpg"));
        image.save(&path).map_err(|source| EnrollError::Save {
            path: path.clone(),
            source,
        })?;
        saved.push(path);
    }

    tracing::info!(
        name,
        attempts = captures,
        saved = saved.len(),
        folder = %folder.display(),
        "registration finished"
    );
    Ok(saved)
}
