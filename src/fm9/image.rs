//! Cover image pipeline
//!
//! FM9 files carry a fixed 100x100 RGB565 cover so a player with no image
//! decoder of its own can blit it straight to a screen. The source image
//! is scaled with bilinear interpolation preserving aspect ratio, centred
//! on a black canvas, optionally quantised to a 16-colour median-cut
//! palette with ordered dithering, and packed little-endian.

use crate::error::{Error, Result};
use image::RgbImage;
use std::path::Path;

/// Cover canvas edge length in pixels
pub const COVER_SIZE: u32 = 100;

/// Encoded cover size: 100 * 100 * 2 bytes
pub const COVER_BYTES: usize = 20_000;

/// Largest accepted source dimension
pub const MAX_DIMENSION: u32 = 4096;

/// Largest accepted source file
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Quantised palette size
const PALETTE_SIZE: usize = 16;

/// 4x4 Bayer threshold matrix
const BAYER: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Dither amplitude in 8-bit channel units
const DITHER_SPREAD: f32 = 32.0;

/// Load an image file and run the full cover pipeline
pub fn load_cover(path: &Path, dither: bool) -> Result<Vec<u8>> {
    let meta = std::fs::metadata(path).map_err(|source| Error::InputOpen {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > MAX_FILE_BYTES {
        return Err(Error::ImageTooLarge(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            meta.len(),
            MAX_FILE_BYTES
        )));
    }

    let img = image::open(path)
        .map_err(|e| Error::ImageDecode(format!("{}: {}", path.display(), e)))?
        .to_rgb8();
    prepare_cover(&img, dither)
}

/// Scale, composite, optionally quantise, and encode a decoded image.
/// The output is always exactly [`COVER_BYTES`] long.
pub fn prepare_cover(src: &RgbImage, dither: bool) -> Result<Vec<u8>> {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::ImageDecode("empty image".into()));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(Error::ImageTooLarge(format!(
            "{}x{} exceeds {}x{}",
            w, h, MAX_DIMENSION, MAX_DIMENSION
        )));
    }

    // Fit inside the canvas, preserving aspect ratio
    let scale = (COVER_SIZE as f32 / w as f32).min(COVER_SIZE as f32 / h as f32);
    let dw = ((w as f32 * scale).round() as u32).clamp(1, COVER_SIZE);
    let dh = ((h as f32 * scale).round() as u32).clamp(1, COVER_SIZE);

    let scaled = scale_bilinear(src, dw, dh);

    // Centre on a black canvas
    let mut canvas = RgbImage::new(COVER_SIZE, COVER_SIZE);
    let x0 = (COVER_SIZE - dw) / 2;
    let y0 = (COVER_SIZE - dh) / 2;
    for y in 0..dh {
        for x in 0..dw {
            canvas.put_pixel(x0 + x, y0 + y, *scaled.get_pixel(x, y));
        }
    }

    if dither {
        quantize_ordered(&mut canvas);
    }

    Ok(encode_rgb565(&canvas))
}

/// Bilinear resampling. Each destination pixel samples the source at
/// (x+0.5)*sw/dw - 0.5, clamped to the edges, and blends the four
/// neighbours per channel.
fn scale_bilinear(src: &RgbImage, dw: u32, dh: u32) -> RgbImage {
    let (sw, sh) = src.dimensions();
    let mut out = RgbImage::new(dw, dh);

    for dy in 0..dh {
        let sy = ((dy as f32 + 0.5) * sh as f32 / dh as f32 - 0.5).max(0.0);
        let y0 = (sy as u32).min(sh - 1);
        let y1 = (y0 + 1).min(sh - 1);
        let fy = sy - y0 as f32;

        for dx in 0..dw {
            let sx = ((dx as f32 + 0.5) * sw as f32 / dw as f32 - 0.5).max(0.0);
            let x0 = (sx as u32).min(sw - 1);
            let x1 = (x0 + 1).min(sw - 1);
            let fx = sx - x0 as f32;

            let p00 = src.get_pixel(x0, y0).0;
            let p10 = src.get_pixel(x1, y0).0;
            let p01 = src.get_pixel(x0, y1).0;
            let p11 = src.get_pixel(x1, y1).0;

            let mut px = [0u8; 3];
            for c in 0..3 {
                let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                px[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(dx, dy, image::Rgb(px));
        }
    }

    out
}

/// Perceptually weighted squared colour distance (green dominant)
fn color_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (2 * dr * dr + 4 * dg * dg + 3 * db * db) as u32
}

/// Median-cut palette over the given pixels. The last slot is always
/// exact black so the letterbox bands stay crisp.
fn median_cut_palette(pixels: &[[u8; 3]]) -> Vec<[u8; 3]> {
    let mut boxes: Vec<Vec<[u8; 3]>> = Vec::new();
    if !pixels.is_empty() {
        boxes.push(pixels.to_vec());
    }

    while boxes.len() < PALETTE_SIZE {
        // Split the box with the widest channel range
        let mut widest = None;
        let mut widest_range = 0u8;
        let mut widest_channel = 0usize;
        for (i, b) in boxes.iter().enumerate() {
            if b.len() < 2 {
                continue;
            }
            for c in 0..3 {
                let min = b.iter().map(|p| p[c]).min().unwrap_or(0);
                let max = b.iter().map(|p| p[c]).max().unwrap_or(0);
                let range = max - min;
                if range > widest_range {
                    widest = Some(i);
                    widest_range = range;
                    widest_channel = c;
                }
            }
        }
        let Some(i) = widest else {
            break;
        };

        let mut b = boxes.swap_remove(i);
        b.sort_by_key(|p| p[widest_channel]);
        let mid = b.len() / 2;
        let high = b.split_off(mid);
        boxes.push(b);
        boxes.push(high);
    }

    let mut palette: Vec<[u8; 3]> = boxes
        .iter()
        .map(|b| {
            let n = b.len() as u32;
            let mut sum = [0u32; 3];
            for p in b {
                for c in 0..3 {
                    sum[c] += p[c] as u32;
                }
            }
            [
                (sum[0] / n) as u8,
                (sum[1] / n) as u8,
                (sum[2] / n) as u8,
            ]
        })
        .collect();

    if !palette.contains(&[0, 0, 0]) {
        if palette.len() < PALETTE_SIZE {
            palette.push([0, 0, 0]);
        } else {
            *palette.last_mut().unwrap() = [0, 0, 0];
        }
    }

    palette
}

/// Quantise the canvas to a 16-colour palette with 4x4 Bayer ordered
/// dithering.
fn quantize_ordered(canvas: &mut RgbImage) {
    let non_black: Vec<[u8; 3]> = canvas
        .pixels()
        .map(|p| p.0)
        .filter(|p| *p != [0, 0, 0])
        .collect();
    let palette = median_cut_palette(&non_black);

    for y in 0..canvas.height() {
        for x in 0..canvas.width() {
            let px = canvas.get_pixel(x, y).0;
            let threshold = (BAYER[(y % 4) as usize][(x % 4) as usize] as f32 + 0.5) / 16.0 - 0.5;
            let mut adjusted = [0u8; 3];
            for c in 0..3 {
                adjusted[c] =
                    (px[c] as f32 + threshold * DITHER_SPREAD).clamp(0.0, 255.0) as u8;
            }

            let nearest = palette
                .iter()
                .min_by_key(|p| color_distance(adjusted, **p))
                .copied()
                .unwrap_or([0, 0, 0]);
            canvas.put_pixel(x, y, image::Rgb(nearest));
        }
    }
}

/// Pack the canvas as little-endian RGB565
fn encode_rgb565(canvas: &RgbImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(COVER_BYTES);
    for y in 0..canvas.height() {
        for x in 0..canvas.width() {
            let [r, g, b] = canvas.get_pixel(x, y).0;
            let packed = (((r & 0xF8) as u16) << 8)
                | (((g & 0xFC) as u16) << 3)
                | ((b >> 3) as u16);
            out.extend_from_slice(&packed.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb(rgb))
    }

    #[test]
    fn test_output_always_20000_bytes() {
        for (w, h) in [(1, 1), (100, 100), (640, 480), (13, 401)] {
            let cover = prepare_cover(&solid(w, h, [200, 40, 90]), true).unwrap();
            assert_eq!(cover.len(), COVER_BYTES);
            let cover = prepare_cover(&solid(w, h, [200, 40, 90]), false).unwrap();
            assert_eq!(cover.len(), COVER_BYTES);
        }
    }

    #[test]
    fn test_oversized_rejected() {
        let img = solid(MAX_DIMENSION + 1, 1, [0, 0, 0]);
        assert!(matches!(
            prepare_cover(&img, false),
            Err(Error::ImageTooLarge(_))
        ));
    }

    #[test]
    fn test_rgb565_packing() {
        // Pure white packs to 0xFFFF, pure red to 0xF800
        let cover = prepare_cover(&solid(100, 100, [255, 255, 255]), false).unwrap();
        assert_eq!(&cover[0..2], &[0xFF, 0xFF]);
        let cover = prepare_cover(&solid(100, 100, [255, 0, 0]), false).unwrap();
        assert_eq!(&cover[0..2], &[0x00, 0xF8]);
    }

    #[test]
    fn test_letterbox_is_black() {
        // A wide image leaves black bands top and bottom
        let cover = prepare_cover(&solid(200, 100, [255, 255, 255]), false).unwrap();
        // Top-left pixel is in the letterbox band
        assert_eq!(&cover[0..2], &[0x00, 0x00]);
        // Centre pixel is white
        let mid = (50 * 100 + 50) * 2;
        assert_eq!(&cover[mid..mid + 2], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_dither_keeps_letterbox_black() {
        let cover = prepare_cover(&solid(200, 100, [180, 90, 30]), true).unwrap();
        assert_eq!(&cover[0..2], &[0x00, 0x00]);
    }

    #[test]
    fn test_palette_forces_black() {
        let pixels = vec![[255u8, 255, 255]; 50];
        let palette = median_cut_palette(&pixels);
        assert!(palette.contains(&[0, 0, 0]));
    }

    #[test]
    fn test_palette_size_bounded() {
        let pixels: Vec<[u8; 3]> = (0..1000u32)
            .map(|i| [(i % 255) as u8, (i * 7 % 255) as u8, (i * 13 % 255) as u8])
            .collect();
        let palette = median_cut_palette(&pixels);
        assert!(palette.len() <= PALETTE_SIZE);
    }
}
