//! Live preview: face boxes and labels drawn over the camera frame.

use crate::session::Sighting;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use minifb::{Key, WindowOptions};
use rollcall_hw::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 18.0;

/// Tried in order when no overlay font is configured.
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to open preview window: {0}")]
    Window(#[from] minifb::Error),
    #[error("failed to read font {path}: {source}")]
    FontRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    FontInvalid(PathBuf),
}

/// Whether the recognition loop should keep going after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Shows each processed frame and reports the operator's stop request.
pub trait Viewer {
    fn present(&mut self, frame: &Frame, sightings: &[Sighting]) -> Result<Control, DisplayError>;
}

/// No window. Stops after `max_frames` frames, or never.
pub struct Headless {
    max_frames: Option<u64>,
    shown: u64,
}

impl Headless {
    pub fn new(max_frames: Option<u64>) -> Self {
        Self { max_frames, shown: 0 }
    }
}

impl Viewer for Headless {
    fn present(
        &mut self,
        _frame: &Frame,
        _sightings: &[Sighting],
    ) -> Result<Control, DisplayError> {
        self.shown += 1;
        Ok(match self.max_frames {
            Some(max) if self.shown >= max => Control::Stop,
            _ => Control::Continue,
        })
    }
}

/// minifb window; `q`, `Esc` or closing the window stops the loop.
pub struct PreviewWindow {
    window: minifb::Window,
    font: Option<FontVec>,
    buffer: Vec<u32>,
    max_frames: Option<u64>,
    shown: u64,
}

impl PreviewWindow {
    pub fn open(
        title: &str,
        width: u32,
        height: u32,
        font_path: Option<&Path>,
        max_frames: Option<u64>,
    ) -> Result<Self, DisplayError> {
        let font = overlay_font(font_path, &SYSTEM_FONTS.map(Path::new))?;
        let options = WindowOptions::default();
        let window = minifb::Window::new(title, width as usize, height as usize, options)?;
        Ok(Self {
            window,
            font,
            buffer: Vec::new(),
            max_frames,
            shown: 0,
        })
    }
}

impl Viewer for PreviewWindow {
    fn present(&mut self, frame: &Frame, sightings: &[Sighting]) -> Result<Control, DisplayError> {
        let annotated = annotate(&frame.image, sightings, self.font.as_ref());
        fill_buffer(&annotated, &mut self.buffer);
        self.window.update_with_buffer(
            &self.buffer,
            annotated.width() as usize,
            annotated.height() as usize,
        )?;
        self.shown += 1;

        let quit = !self.window.is_open()
            || self.window.is_key_down(Key::Q)
            || self.window.is_key_down(Key::Escape)
            || self.max_frames.is_some_and(|max| self.shown >= max);
        Ok(if quit { Control::Stop } else { Control::Continue })
    }
}

/// The configured font, which must load, or else the first usable system font.
fn overlay_font(
    configured: Option<&Path>,
    fallbacks: &[&Path],
) -> Result<Option<FontVec>, DisplayError> {
    if let Some(path) = configured {
        return load_font(path).map(Some);
    }
    for path in fallbacks.iter().filter(|p| p.is_file()) {
        match load_font(path) {
            Ok(font) => {
                tracing::debug!(path = %path.display(), "overlay font");
                return Ok(Some(font));
            }
            Err(e) => tracing::debug!(error = %e, "skipping system font"),
        }
    }
    tracing::warn!("no usable font found, set ROLLCALL_FONT_PATH to label faces");
    Ok(None)
}

fn load_font(path: &Path) -> Result<FontVec, DisplayError> {
    let bytes = std::fs::read(path).map_err(|source| DisplayError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    FontVec::try_from_vec(bytes).map_err(|_| DisplayError::FontInvalid(path.to_path_buf()))
}

/// Copy of `image` with a two-pixel box around each face and, when a font is
/// available, the label just inside the bottom-left corner.
pub fn annotate(image: &RgbImage, sightings: &[Sighting], font: Option<&FontVec>) -> RgbImage {
    let mut canvas = image.clone();
    for sighting in sightings {
        let b = &sighting.face;
        let color = if sighting.name.is_some() { KNOWN_COLOR } else { UNKNOWN_COLOR };
        let (left, top) = (b.x.round() as i32, b.y.round() as i32);
        let (width, height) = (b.width.round().max(1.0) as u32, b.height.round().max(1.0) as u32);

        draw_hollow_rect_mut(&mut canvas, Rect::at(left, top).of_size(width, height), color);
        if width > 2 && height > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(left + 1, top + 1).of_size(width - 2, height - 2),
                color,
            );
        }

        if let Some(font) = font {
            let baseline = top + height as i32 - 6 - LABEL_SCALE as i32;
            draw_text_mut(
                &mut canvas,
                LABEL_COLOR,
                left + 6,
                baseline,
                PxScale::from(LABEL_SCALE),
                font,
                sighting.label(),
            );
        }
    }
    canvas
}

/// Pack RGB pixels into minifb's 0RGB `u32` layout.
fn fill_buffer(image: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        image
            .pixels()
            .map(|p| (p.0[0] as u32) << 16 | (p.0[1] as u32) << 8 | p.0[2] as u32),
    );
}
