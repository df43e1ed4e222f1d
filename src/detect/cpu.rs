//! Model-free CPU detector.
//!
//! A stand-in heuristic for environments without model assets: reports at
//! most one face, found by luminance variance over the center crop, and calls
//! it masked when the lower half of the crop reads brighter than the upper
//! half. Not a real classifier; it exists so the full pipeline runs
//! end-to-end on synthetic or live frames without a model runtime.

use anyhow::{anyhow, Result};

use super::{FaceDetection, MaskDetector, MaskStatus};

/// Luminance variance below this carries no face signal (flat scene).
const FACE_VARIANCE_FLOOR: f32 = 120.0;

/// CPU detector backend.
pub struct CpuDetector {
    min_confidence: f32,
}

impl CpuDetector {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }
}

impl MaskDetector for CpuDetector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<FaceDetection>> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.is_empty() || expected == 0 {
            return Ok(Vec::new());
        }
        if pixels.len() < expected {
            return Err(anyhow!(
                "frame buffer truncated: {} bytes for {}x{} RGB",
                pixels.len(),
                width,
                height
            ));
        }

        let stats = crop_stats(pixels, width, height);
        if stats.variance < FACE_VARIANCE_FLOOR {
            return Ok(Vec::new());
        }

        let confidence = stats.variance / (stats.variance + FACE_VARIANCE_FLOOR);
        if confidence < self.min_confidence {
            return Ok(Vec::new());
        }

        let status = if stats.lower_mean > stats.upper_mean {
            MaskStatus::Mask
        } else {
            MaskStatus::NoMask
        };
        Ok(vec![FaceDetection {
            face_id: 0,
            status,
            confidence,
        }])
    }
}

struct CropStats {
    upper_mean: f32,
    lower_mean: f32,
    variance: f32,
}

/// Luminance statistics over the middle half of the frame in both dimensions.
fn crop_stats(pixels: &[u8], width: u32, height: u32) -> CropStats {
    let width = width as usize;
    let height = height as usize;
    let (x0, x1) = (width / 4, (width * 3) / 4);
    let (y0, y1) = (height / 4, (height * 3) / 4);
    let y_mid = (y0 + y1) / 2;

    let mut upper_sum = 0.0f32;
    let mut upper_n = 0u32;
    let mut lower_sum = 0.0f32;
    let mut lower_n = 0u32;
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut n = 0u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let i = (y * width + x) * 3;
            let luma =
                (pixels[i] as f32 + pixels[i + 1] as f32 + pixels[i + 2] as f32) / 3.0;
            sum += luma;
            sum_sq += luma * luma;
            n += 1;
            if y < y_mid {
                upper_sum += luma;
                upper_n += 1;
            } else {
                lower_sum += luma;
                lower_n += 1;
            }
        }
    }

    let n = n.max(1) as f32;
    let mean = sum / n;
    CropStats {
        upper_mean: upper_sum / upper_n.max(1) as f32,
        lower_mean: lower_sum / lower_n.max(1) as f32,
        variance: (sum_sq / n) - mean * mean,
    }
}
