//! Artifact Generator
//!
//! Everything written next to the machine programs:
//! - sheet preview images ([`preview`])
//! - part and offcut labels ([`labels`])
//! - `.cyc` cycle manifests and the `chapas.xml` sheet index ([`cycle`])
//!
//! Rasters are drawn with tiny-skia and encoded with `image`, in the format
//! named by the machine profile.

pub mod cycle;
pub mod labels;
pub mod preview;

use crate::error::NestResult;
use image::{imageops, ImageFormat, Rgb, RgbImage};
use nestkit_core::ImageSettings;
use std::path::{Path, PathBuf};
use tiny_skia::Pixmap;
use tracing::warn;

pub use cycle::{write_cycle_manifest, write_sheet_index, CycleEntry, LabelRef};
pub use labels::{render_label, LabelValues};
pub use preview::render_sheet_preview;

const FALLBACK_FORMAT: &str = "png";

/// Validated raster format and the file extension to write it with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterFormat {
    pub format: ImageFormat,
    pub extension: &'static str,
}

/// Resolve a configured format name to one the encoder can write,
/// falling back to PNG
pub fn resolve_image_format(name: &str) -> RasterFormat {
    let wanted = name.trim().trim_start_matches('.').to_lowercase();
    match ImageFormat::from_extension(&wanted) {
        Some(format) if format.writing_enabled() && encodes_rgb8(format) => RasterFormat {
            format,
            extension: format.extensions_str().first().copied().unwrap_or(FALLBACK_FORMAT),
        },
        _ => {
            warn!(format = %name, "Unsupported image format, using {}", FALLBACK_FORMAT);
            RasterFormat {
                format: ImageFormat::Png,
                extension: FALLBACK_FORMAT,
            }
        }
    }
}

/// Formats whose encoders accept 8-bit RGB
fn encodes_rgb8(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Bmp
            | ImageFormat::Tiff
            | ImageFormat::Tga
            | ImageFormat::Pnm
            | ImageFormat::WebP
            | ImageFormat::Qoi
    )
}

/// Flatten a pixmap onto white and drop alpha
pub(crate) fn pixmap_to_rgb(pixmap: &Pixmap) -> RgbImage {
    let (width, height) = (pixmap.width(), pixmap.height());
    let data = pixmap.data();
    RgbImage::from_fn(width, height, |x, y| {
        let idx = ((y * width + x) * 4) as usize;
        // Premultiplied: composite over white
        let inv = 255 - data[idx + 3];
        Rgb([
            data[idx].saturating_add(inv),
            data[idx + 1].saturating_add(inv),
            data[idx + 2].saturating_add(inv),
        ])
    })
}

/// Apply mirror/rotate settings and write the image as `<stem>.<ext>`
pub fn save_raster(image: RgbImage, stem: &Path, settings: &ImageSettings) -> NestResult<PathBuf> {
    let raster = resolve_image_format(&settings.format);
    let mut image = image;
    if settings.mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }
    if settings.rotate {
        image = imageops::rotate90(&image);
    }

    let mut path = stem.as_os_str().to_owned();
    path.push(".");
    path.push(raster.extension);
    let path = PathBuf::from(path);
    image.save_with_format(&path, raster.format)?;
    Ok(path)
}
