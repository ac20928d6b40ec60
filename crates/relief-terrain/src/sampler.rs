//! Color sample to height conversion

use relief_core::ColorSample;

/// Rec. 601 luma weight for the red channel
pub const RED_WEIGHT: f32 = 0.299;
/// Rec. 601 luma weight for the green channel
pub const GREEN_WEIGHT: f32 = 0.587;
/// Rec. 601 luma weight for the blue channel
pub const BLUE_WEIGHT: f32 = 0.114;

/// Map a color sample to a height unit in [0..1] using its luminance.
/// Alpha is ignored.
#[inline]
pub fn sample_height(sample: ColorSample) -> f32 {
    (sample.r as f32 * RED_WEIGHT + sample.g as f32 * GREEN_WEIGHT + sample.b as f32 * BLUE_WEIGHT)
        / 255.0
}
