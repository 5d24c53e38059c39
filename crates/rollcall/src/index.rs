//! Encoding index: one embedding per usable reference image, paired with the
//! display name taken from the file name.

use rollcall_core::{Embedding, EngineError, FaceEngine, MatchPredicate};
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to read enrollment folder {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("engine error while encoding {path}: {source}")]
    Engine { path: PathBuf, source: EngineError },
}

/// Parallel embeddings and display names; position `i` of each belongs together.
#[derive(Debug, Clone, Default)]
pub struct EncodingIndex {
    embeddings: Vec<Embedding>,
    names: Vec<String>,
}

impl EncodingIndex {
    /// Encode every image directly inside `folder`.
    ///
    /// Files are visited in sorted file-name order. An image that cannot be
    /// decoded is skipped with a warning, and an image with no face is skipped
    /// silently. Only the first detected face of each image is used.
    pub fn build(folder: &Path, engine: &mut dyn FaceEngine) -> Result<Self, IndexError> {
        let read_err = |source| IndexError::ReadDir {
            path: folder.to_path_buf(),
            source,
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
            .map_err(read_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        files.sort();

        let mut index = Self::default();
        for path in files {
            let image = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    continue;
                }
            };

            let faces = engine.detect(&image).map_err(|source| IndexError::Engine {
                path: path.clone(),
                source,
            })?;
            let Some(face) = faces.first() else {
                tracing::debug!(path = %path.display(), "no face found, skipping");
                continue;
            };
            let embedding = engine.encode(&image, face).map_err(|source| IndexError::Engine {
                path: path.clone(),
                source,
            })?;

            let Some(name) = display_name(&path) else {
                continue;
            };
            tracing::debug!(path = %path.display(), name, "enrolled face indexed");
            index.push(name, embedding);
        }

        tracing::info!(folder = %folder.display(), faces = index.len(), "encoding index built");
        Ok(index)
    }

    pub fn push(&mut self, name: impl Into<String>, embedding: Embedding) {
        self.names.push(name.into());
        self.embeddings.push(embedding);
    }

    /// First enrolled name, in insertion order, whose embedding satisfies
    /// `predicate` against `probe`. Later entries are never consulted once one
    /// matches, even if they would be closer.
    pub fn first_match(&self, probe: &Embedding, predicate: &dyn MatchPredicate) -> Option<&str> {
        self.embeddings
            .iter()
            .position(|enrolled| predicate.is_match(enrolled, probe))
            .map(|i| self.names[i].as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// File stem up to (not including) the first underscore: `Alice_3.jpg` → `Alice`.
pub fn display_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.split('_').next().unwrap_or(stem).to_string())
}
