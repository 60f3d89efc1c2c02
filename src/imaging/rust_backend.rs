//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` (format sniffed from content) |
//! | Mirror | `image::DynamicImage::fliph` |
//! | Encode → raw | `image::DynamicImage::into_bytes` |
//! | Encode → PNG | `image::DynamicImage::write_to` with `ImageFormat::Png` |

use super::backend::{BackendError, Dimensions, ImageBackend, Mirrored};
use super::params::Encoding;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Backend using the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(image: DynamicImage, encoding: Encoding) -> Result<Vec<u8>, BackendError> {
    match encoding {
        Encoding::Raw => Ok(image.into_bytes()),
        Encoding::Png => {
            let mut out = Cursor::new(Vec::new());
            image
                .write_to(&mut out, ImageFormat::Png)
                .map_err(|e| BackendError::Encode(e.to_string()))?;
            Ok(out.into_inner())
        }
    }
}

impl ImageBackend for RustBackend {
    fn mirror(&self, data: &[u8], encoding: Encoding) -> Result<Mirrored, BackendError> {
        let decoded =
            image::load_from_memory(data).map_err(|e| BackendError::Decode(e.to_string()))?;
        let mirrored = decoded.fliph();
        let (width, height) = mirrored.dimensions();
        Ok(Mirrored {
            bytes: encode(mirrored, encoding)?,
            dimensions: Dimensions { width, height },
        })
    }
}
