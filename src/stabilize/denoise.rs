//! Center-pixel extraction for the 3×3 canvas oversampling exploit.
//!
//! WebKit 616+ poisons canvas readback with per-pixel noise whose magnitude
//! is clamped by the pixel's 8-neighbourhood. Scaling the source canvas by
//! 3× with image smoothing disabled turns every original pixel into a 3×3
//! block of bit-identical values; the block's center pixel has eight equal
//! neighbours, which forces the clamped noise there to zero. Reading only
//! block centers therefore recovers the unpoisoned image.
//!
//! This module is the pure byte-level half of the exploit; the DOM half
//! (scratch canvas, `getImageData`) lives in the canvas source.

/// Scale factor applied to the source canvas before readback.
pub const SCALE: usize = 3;

/// Extract the center pixel of every 3×3 block from an RGBA buffer read
/// from a canvas of `SCALE * width` × `SCALE * height` pixels.
///
/// Returns the reassembled `width` × `height` RGBA buffer. Returns `None`
/// when the buffer does not have the expected scaled geometry.
pub fn extract_block_centers(scaled: &[u8], width: usize, height: usize) -> Option<Vec<u8>> {
    let scaled_width = width * SCALE;
    let scaled_height = height * SCALE;
    if scaled.len() != scaled_width * scaled_height * 4 {
        return None;
    }

    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row_start = (y * SCALE + 1) * scaled_width;
        for x in 0..width {
            let px = (row_start + x * SCALE + 1) * 4;
            out.extend_from_slice(&scaled[px..px + 4]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nearest-neighbour 3× upscale, as the browser performs it with image
    /// smoothing disabled.
    fn upscale(original: &[u8], width: usize, height: usize) -> Vec<u8> {
        let scaled_width = width * SCALE;
        let mut out = vec![0u8; scaled_width * height * SCALE * 4];
        for sy in 0..height * SCALE {
            for sx in 0..scaled_width {
                let src = ((sy / SCALE) * width + sx / SCALE) * 4;
                let dst = (sy * scaled_width + sx) * 4;
                out[dst..dst + 4].copy_from_slice(&original[src..src + 4]);
            }
        }
        out
    }

    /// Neighbourhood-clamped noise model: a pixel whose 8 neighbours all
    /// equal it receives zero noise; every other pixel is perturbed.
    fn apply_clamped_noise(scaled: &mut [u8], width: usize, height: usize) {
        let sw = width * SCALE;
        let sh = height * SCALE;
        let original = scaled.to_vec();
        let pixel = |x: usize, y: usize| {
            let i = (y * sw + x) * 4;
            &original[i..i + 4]
        };
        for y in 0..sh {
            for x in 0..sw {
                let uniform = (y > 0 && y < sh - 1 && x > 0 && x < sw - 1)
                    && (y - 1..=y + 1).all(|ny| {
                        (x - 1..=x + 1).all(|nx| pixel(nx, ny) == pixel(x, y))
                    });
                if !uniform {
                    let i = (y * sw + x) * 4;
                    for c in 0..3 {
                        scaled[i + c] = scaled[i + c].wrapping_add(1);
                    }
                }
            }
        }
    }

    fn checkerboard(width: usize, height: usize) -> Vec<u8> {
        let mut img = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 200 } else { 40 };
                img.extend_from_slice(&[v, v / 2, 255 - v, 255]);
            }
        }
        img
    }

    #[test]
    fn centers_recover_original_under_clamped_noise() {
        let (w, h) = (7, 5);
        let original = checkerboard(w, h);
        let mut scaled = upscale(&original, w, h);
        apply_clamped_noise(&mut scaled, w, h);
        let recovered = extract_block_centers(&scaled, w, h).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn noise_model_actually_perturbs_block_borders() {
        let (w, h) = (4, 4);
        let original = checkerboard(w, h);
        let clean = upscale(&original, w, h);
        let mut noisy = clean.clone();
        apply_clamped_noise(&mut noisy, w, h);
        assert_ne!(clean, noisy);
    }

    #[test]
    fn rejects_wrong_geometry() {
        assert!(extract_block_centers(&[0u8; 16], 2, 2).is_none());
    }

    #[test]
    fn single_pixel_image() {
        let original = vec![1, 2, 3, 255];
        let scaled = upscale(&original, 1, 1);
        assert_eq!(extract_block_centers(&scaled, 1, 1).unwrap(), original);
    }
}
