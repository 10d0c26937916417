// Panel compositing module
// Draws one row of panels into an ARGB8888 (little-endian BGRA) canvas

use crate::app::{Mode, Session};
use crate::image_loader::{with_border, ImageData};

/// Window background, dim gray (B, G, R, A)
pub const BACKGROUND: [u8; 4] = [105, 105, 105, 255];

/// Gap between and around panels in pixels
pub const PANEL_GAP: u32 = 8;

/// Rectangle inside the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest size with the image's aspect ratio that fits in the box
pub fn fit_within(img_width: u32, img_height: u32, box_width: u32, box_height: u32) -> (u32, u32) {
    if img_width == 0 || img_height == 0 || box_width == 0 || box_height == 0 {
        return (0, 0);
    }

    let scale_x = box_width as f32 / img_width as f32;
    let scale_y = box_height as f32 / img_height as f32;
    let scale = scale_x.min(scale_y);

    let width = ((img_width as f32 * scale).round() as u32).clamp(1, box_width);
    let height = ((img_height as f32 * scale).round() as u32).clamp(1, box_height);
    (width, height)
}

/// Slot of panel `column` out of `columns` in a canvas of the given size
pub fn panel_slot(column: u32, columns: u32, width: u32, height: u32) -> Rect {
    let columns = columns.max(1);
    let x0 = column * width / columns;
    let x1 = (column + 1) * width / columns;

    let pad_x = PANEL_GAP.min((x1 - x0) / 4);
    let pad_y = PANEL_GAP.min(height / 4);

    Rect {
        x: x0 + pad_x,
        y: pad_y,
        width: (x1 - x0).saturating_sub(pad_x * 2),
        height: height.saturating_sub(pad_y * 2),
    }
}

/// Where an image lands inside its slot: fitted and centered
pub fn placement(image: &ImageData, slot: Rect) -> Rect {
    let (width, height) = fit_within(image.width, image.height, slot.width, slot.height);
    Rect {
        x: slot.x + (slot.width - width) / 2,
        y: slot.y + (slot.height - height) / 2,
        width,
        height,
    }
}

/// Panels as they should appear for the session's current index: a marked
/// (column, index) gets the red border, everything else is shown as decoded.
pub fn framed_panels(images: &[Option<ImageData>], session: &Session) -> Vec<Option<ImageData>> {
    images
        .iter()
        .enumerate()
        .map(|(column, image)| {
            let marked = session.mode() == Mode::Mark && session.is_marked(column);
            image.as_ref().map(|image| with_border(image, marked))
        })
        .collect()
}

/// Fill the canvas with the background and draw each panel into its slot.
///
/// `None` panels leave their slot empty.
pub fn compose_row(panels: &[Option<ImageData>], canvas: &mut [u8], width: u32, height: u32) {
    for pixel in canvas.chunks_exact_mut(4) {
        pixel.copy_from_slice(&BACKGROUND);
    }

    let columns = panels.len() as u32;
    for (column, panel) in panels.iter().enumerate() {
        let Some(image) = panel else {
            continue;
        };
        let slot = panel_slot(column as u32, columns, width, height);
        let target = placement(image, slot);
        draw_scaled(image, target, canvas, width, height);
    }
}

/// Draw `image` scaled into `target` with bilinear interpolation
fn draw_scaled(image: &ImageData, target: Rect, canvas: &mut [u8], canvas_width: u32, canvas_height: u32) {
    if target.width == 0 || target.height == 0 || image.width == 0 || image.height == 0 {
        return;
    }

    let img_width = image.width;
    let img_height = image.height;
    let src_data = &image.rgba_data[..];

    let scale_x = img_width as f32 / target.width as f32;
    let scale_y = img_height as f32 / target.height as f32;

    let get_pixel = |px: u32, py: u32| -> [u8; 4] {
        let idx = ((py * img_width + px) * 4) as usize;
        if idx + 3 < src_data.len() {
            [
                src_data[idx],
                src_data[idx + 1],
                src_data[idx + 2],
                src_data[idx + 3],
            ]
        } else {
            [0, 0, 0, 0]
        }
    };

    for y in 0..target.height {
        let dst_y = target.y + y;
        if dst_y >= canvas_height {
            break;
        }

        // Sample pixel centers so edges are not biased toward the top-left
        let src_y = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = (src_y.floor() as u32).min(img_height - 1);
        let y1 = (y0 + 1).min(img_height - 1);
        let fy = src_y - y0 as f32;

        for x in 0..target.width {
            let dst_x = target.x + x;
            if dst_x >= canvas_width {
                break;
            }

            let src_x = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = (src_x.floor() as u32).min(img_width - 1);
            let x1 = (x0 + 1).min(img_width - 1);
            let fx = src_x - x0 as f32;

            let p00 = get_pixel(x0, y0);
            let p10 = get_pixel(x1, y0);
            let p01 = get_pixel(x0, y1);
            let p11 = get_pixel(x1, y1);

            let interpolate = |c: usize| -> f32 {
                let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                v0 * (1.0 - fy) + v1 * fy
            };

            // Blend over the background so transparent images stay readable
            let alpha = interpolate(3) / 255.0;
            let dst_idx = ((dst_y * canvas_width + dst_x) * 4) as usize;
            if let Some(dst) = canvas.get_mut(dst_idx..dst_idx + 4) {
                // RGBA source, BGRA destination
                for (dst_c, src_c) in [(0, 2), (1, 1), (2, 0)] {
                    let blended = interpolate(src_c) * alpha + dst[dst_c] as f32 * (1.0 - alpha);
                    dst[dst_c] = blended.round().clamp(0.0, 255.0) as u8;
                }
                dst[3] = 255;
            }
        }
    }
}

/// Natural size of a row of panels: widths side by side, tallest height
pub fn natural_row_size(sizes: &[(u32, u32)]) -> (u32, u32) {
    let gaps = PANEL_GAP * 2 * sizes.len() as u32;
    let width = sizes.iter().map(|&(w, _)| w).sum::<u32>() + gaps;
    let height = sizes.iter().map(|&(_, h)| h).max().unwrap_or(0) + PANEL_GAP * 2;
    (width, height)
}

/// Calculate the display size limited to a percentage of screen area
pub fn calculate_limited_size(
    img_width: u32,
    img_height: u32,
    screen_width: u32,
    screen_height: u32,
    max_screen_fraction: f32,
) -> (u32, u32) {
    let max_width = (screen_width as f32 * max_screen_fraction.sqrt()) as u32;
    let max_height = (screen_height as f32 * max_screen_fraction.sqrt()) as u32;

    if img_width <= max_width && img_height <= max_height {
        return (img_width.max(1), img_height.max(1));
    }

    let (new_width, new_height) = fit_within(img_width, img_height, max_width, max_height);
    (new_width.max(1), new_height.max(1))
}
