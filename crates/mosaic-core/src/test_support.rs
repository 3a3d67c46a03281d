//! Synthetic images for tests.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Smooth value-noise texture. The same seed always yields the same pixels;
/// different seeds are visually unrelated.
pub fn textured_image(seed: u64, width: u32, height: u32) -> DynamicImage {
    const GRID: usize = 9;

    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 56) as f32
    };

    let mut lattice = [[[0f32; 3]; GRID]; GRID];
    for row in lattice.iter_mut() {
        for cell in row.iter_mut() {
            for channel in cell.iter_mut() {
                *channel = next();
            }
        }
    }

    let img = RgbImage::from_fn(width, height, |x, y| {
        let gx = x as f32 / width as f32 * (GRID - 1) as f32;
        let gy = y as f32 / height as f32 * (GRID - 1) as f32;
        let (x0, y0) = (gx.floor() as usize, gy.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(GRID - 1), (y0 + 1).min(GRID - 1));
        let (tx, ty) = (gx - x0 as f32, gy - y0 as f32);

        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            let top = lattice[y0][x0][c] * (1.0 - tx) + lattice[y0][x1][c] * tx;
            let bottom = lattice[y1][x0][c] * (1.0 - tx) + lattice[y1][x1][c] * tx;
            *out = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    });

    DynamicImage::ImageRgb8(img)
}

/// Encode an image in the given container format.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode test image");
    buf
}

/// Lossy JPEG encoding at an explicit quality.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let rgb = img.to_rgb8();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .expect("encode test jpeg");
    buf
}
