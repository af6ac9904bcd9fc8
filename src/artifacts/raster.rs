//! Deterministic raster artifact: a blue ellipse on a transparent canvas.
//!
//! The geometry is the fixture's identity and is fixed by contract: a
//! 640×480 RGBA canvas, fully transparent except for a solid blue ellipse
//! inscribed in the bounding box (120,40)–(520,440), fill and outline the
//! same color. Consumers of the fixture decode and compare against exactly
//! this rendering.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::core::errors::{FixtureError, Result};

/// Canvas width in pixels.
pub const WIDTH: u32 = 640;
/// Canvas height in pixels.
pub const HEIGHT: u32 = 480;
/// Inclusive ellipse bounding box: (left, top, right, bottom).
pub const ELLIPSE_BOUNDS: (u32, u32, u32, u32) = (120, 40, 520, 440);
/// Fill and outline color.
pub const FILL: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Render the test canvas in memory.
///
/// Untouched pixels stay (0,0,0,0), so the alpha channel carries the shape.
#[must_use]
pub fn render_test_image() -> RgbaImage {
    let mut canvas = RgbaImage::new(WIDTH, HEIGHT);
    let (left, top, right, bottom) = ELLIPSE_BOUNDS;
    let cx = f64::from(left + right) / 2.0;
    let cy = f64::from(top + bottom) / 2.0;
    let rx = f64::from(right - left) / 2.0;
    let ry = f64::from(bottom - top) / 2.0;

    for y in top..=bottom {
        for x in left..=right {
            let dx = (f64::from(x) - cx) / rx;
            let dy = (f64::from(y) - cy) / ry;
            if dx.mul_add(dx, dy * dy) <= 1.0 {
                canvas.put_pixel(x, y, FILL);
            }
        }
    }
    canvas
}

/// Render and persist the canvas as a PNG at `path`.
pub fn write_test_image(path: &Path) -> Result<()> {
    render_test_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| FixtureError::Encode {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
}

/// Whether a point lies inside (or on) the fixture ellipse.
#[must_use]
pub fn inside_ellipse(x: u32, y: u32) -> bool {
    let (left, top, right, bottom) = ELLIPSE_BOUNDS;
    let cx = f64::from(left + right) / 2.0;
    let cy = f64::from(top + bottom) / 2.0;
    let rx = f64::from(right - left) / 2.0;
    let ry = f64::from(bottom - top) / 2.0;
    let dx = (f64::from(x) - cx) / rx;
    let dy = (f64::from(y) - cy) / ry;
    dx.mul_add(dx, dy * dy) <= 1.0
}
