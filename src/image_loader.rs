// Image loading module
// Decodes panel images and draws the deletion-mark border

use crate::catalog::ImageSet;
use anyhow::{Context, Result};
use log::{debug, error};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Color of the mark border (RGBA)
pub const MARK_COLOR: [u8; 4] = [255, 0, 0, 255];

/// Decoded image data ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Raw RGBA pixel data (4 bytes per pixel)
    pub rgba_data: Vec<u8>,
}

#[cfg(test)]
impl ImageData {
    /// RGBA value of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.rgba_data
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Load one image file into RGBA pixels
pub fn load_image(path: &Path) -> Result<ImageData> {
    let data = fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;
    let img = load_from_bytes(&data)
        .with_context(|| format!("Failed to load image: {}", path.display()))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(ImageData {
        width,
        height,
        rgba_data: rgba.into_raw(),
    })
}

/// Load the image of every column at `index`.
///
/// A file that cannot be decoded is logged and yields `None` so the rest of
/// the row can still be shown.
pub fn load_row(set: &ImageSet, index: usize) -> Vec<Option<ImageData>> {
    set.row(index)
        .map(|path| {
            let path = path?;
            match load_image(path) {
                Ok(img) => {
                    debug!("Loaded {} ({}x{})", path.display(), img.width, img.height);
                    Some(img)
                }
                Err(e) => {
                    error!("{e:#}");
                    None
                }
            }
        })
        .collect()
}

/// Load an image from raw bytes, auto-detecting the format
fn load_from_bytes(data: &[u8]) -> Result<image::DynamicImage> {
    let format = image::guess_format(data).context("Failed to detect image format")?;

    let cursor = Cursor::new(data);
    let img = image::load(cursor, format).context("Failed to decode image")?;

    Ok(img)
}

/// Width of the mark border: a twentieth of the shorter side
pub fn border_thickness(width: u32, height: u32) -> u32 {
    width.min(height) / 20
}

/// Return a copy of `image`, framed in red when `marked`
pub fn with_border(image: &ImageData, marked: bool) -> ImageData {
    let mut framed = image.clone();
    if !marked {
        return framed;
    }

    let (width, height) = (image.width, image.height);
    let thickness = border_thickness(width, height);

    for y in 0..height {
        let in_band_y = y < thickness || y >= height - thickness;
        for x in 0..width {
            if in_band_y || x < thickness || x >= width - thickness {
                let idx = ((y * width + x) * 4) as usize;
                if let Some(pixel) = framed.rgba_data.get_mut(idx..idx + 4) {
                    pixel.copy_from_slice(&MARK_COLOR);
                }
            }
        }
    }

    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> ImageData {
        ImageData {
            width,
            height,
            rgba_data: color.repeat((width * height) as usize),
        }
    }

    #[test]
    fn thickness_follows_shorter_side() {
        assert_eq!(border_thickness(400, 200), 10);
        assert_eq!(border_thickness(200, 400), 10);
        assert_eq!(border_thickness(19, 100), 0);
    }

    #[test]
    fn unmarked_image_is_unchanged() {
        let img = solid(40, 40, [10, 20, 30, 255]);
        assert_eq!(with_border(&img, false), img);
    }

    #[test]
    fn marked_image_gets_red_band() {
        let white = [255, 255, 255, 255];
        let img = solid(100, 60, white);
        let framed = with_border(&img, true);
        let t = border_thickness(100, 60);
        assert_eq!(t, 3);

        for (x, y) in [(0, 0), (99, 59), (t - 1, 30), (50, t - 1), (100 - t, 30), (50, 60 - t)] {
            assert_eq!(framed.pixel(x, y), Some(MARK_COLOR), "({x}, {y})");
        }
        for (x, y) in [(t, t), (50, 30), (99 - t, 59 - t)] {
            assert_eq!(framed.pixel(x, y), Some(white), "({x}, {y})");
        }

        // the source buffer is left untouched
        assert_eq!(img.pixel(0, 0), Some(white));
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.pixel(2, 1), Some([1, 2, 3, 255]));
    }

    #[test]
    fn row_keeps_going_past_broken_files() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([9, 9, 9, 255]))
            .save(a.path().join("img0.png"))
            .unwrap();
        fs::write(b.path().join("img0.png"), b"garbage").unwrap();

        let set = crate::catalog::scan(&[a.path().to_path_buf(), b.path().to_path_buf()], "png")
            .unwrap();
        let row = load_row(&set, 0);

        assert_eq!(row.len(), 2);
        assert_eq!(row[0].as_ref().map(|img| img.width), Some(2));
        assert!(row[1].is_none());
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.png"));
    }

    #[test]
    fn pixel_outside_image_is_none() {
        let img = solid(4, 3, [1, 1, 1, 255]);
        assert_eq!(img.pixel(3, 2), Some([1, 1, 1, 255]));
        assert_eq!(img.pixel(4, 0), None);
        assert_eq!(img.pixel(0, 3), None);
    }
}
