use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;

use super::geometry::Vec2;

#[derive(Debug, Error)]
pub enum BeamMaskError {
    #[error("failed to read beam mask {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode beam mask image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("beam mask has no pixels")]
    Empty,
    #[error("beam mask alpha length mismatch: expected {expected}, got {actual}")]
    AlphaLengthMismatch { expected: usize, actual: usize },
}

/// Pre-authored beam mask reduced to its alpha channel. Opaque means lit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl AlphaMask {
    pub fn from_alpha(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self, BeamMaskError> {
        if width == 0 || height == 0 {
            return Err(BeamMaskError::Empty);
        }
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(BeamMaskError::AlphaLengthMismatch {
                expected,
                actual: alpha.len(),
            });
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// With `invert_alpha`, the image is read as a darkness stencil
    /// (transparent where the beam shines) and flipped into a lit mask.
    pub fn from_png_bytes(bytes: &[u8], invert_alpha: bool) -> Result<Self, BeamMaskError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let alpha = rgba
            .pixels()
            .map(|pixel| {
                let value = pixel.0[3];
                if invert_alpha {
                    u8::MAX - value
                } else {
                    value
                }
            })
            .collect();
        Self::from_alpha(width, height, alpha)
    }

    pub fn from_path(path: &Path, invert_alpha: bool) -> Result<Self, BeamMaskError> {
        let bytes = fs::read(path).map_err(|source| BeamMaskError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_png_bytes(&bytes, invert_alpha)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.alpha
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Opacity at a point in mask-local pixel space whose origin is the image centre.
    pub fn sample_centered(&self, local_px: Vec2) -> f32 {
        let x = (local_px.x + self.width as f32 * 0.5).floor();
        let y = (local_px.y + self.height as f32 * 0.5).floor();
        if x < 0.0 || y < 0.0 {
            return 0.0;
        }
        self.alpha_at(x as u32, y as u32)
            .map(|value| value as f32 / u8::MAX as f32)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{Rgba, RgbaImage};

    use super::*;

    /// Encodes a PNG whose alpha is opaque inside a +x facing wedge centred on the image.
    pub(crate) fn wedge_png(size: u32, half_angle: f32, stencil: bool) -> Vec<u8> {
        let center = size as f32 * 0.5;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let inside = dx > 0.0 && dy.atan2(dx).abs() <= half_angle && dx.hypot(dy) <= center;
            let lit = if inside { 255 } else { 0 };
            let alpha = if stencil { 255 - lit } else { lit };
            Rgba([0, 0, 0, alpha])
        });
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn decodes_alpha_channel() {
        let mask = AlphaMask::from_png_bytes(&wedge_png(32, 0.6, false), false).expect("mask");
        assert_eq!(mask.width(), 32);
        assert_eq!(mask.alpha_at(30, 16), Some(255));
        assert_eq!(mask.alpha_at(1, 16), Some(0));
        assert_eq!(mask.alpha_at(32, 0), None);
    }

    #[test]
    fn invert_alpha_turns_stencil_into_lit_mask() {
        let lit = AlphaMask::from_png_bytes(&wedge_png(32, 0.6, false), false).expect("lit");
        let stencil = AlphaMask::from_png_bytes(&wedge_png(32, 0.6, true), true).expect("stencil");
        assert_eq!(lit, stencil);
    }

    #[test]
    fn centered_sampling_is_zero_outside_image() {
        let mask = AlphaMask::from_alpha(2, 2, vec![255; 4]).expect("mask");
        assert_eq!(mask.sample_centered(Vec2::new(0.0, 0.0)), 1.0);
        assert_eq!(mask.sample_centered(Vec2::new(-1.0, -1.0)), 1.0);
        assert_eq!(mask.sample_centered(Vec2::new(1.0, 0.0)), 0.0);
        assert_eq!(mask.sample_centered(Vec2::new(-1.5, 0.0)), 0.0);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = AlphaMask::from_png_bytes(b"not a png", false).expect_err("decode");
        assert!(matches!(err, BeamMaskError::Decode(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let temp = tempfile::TempDir::new().expect("temp");
        let path = temp.path().join("missing.png");
        let err = AlphaMask::from_path(&path, false).expect_err("missing");
        assert!(err.to_string().contains("missing.png"));
    }

    #[test]
    fn alpha_length_is_checked() {
        let err = AlphaMask::from_alpha(2, 2, vec![0; 3]).expect_err("length");
        assert!(matches!(
            err,
            BeamMaskError::AlphaLengthMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }
}
