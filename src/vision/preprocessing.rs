// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pixel preprocessing shared by the BLIP family

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

/// CLIP normalization mean (used by both BLIP and BLIP-2 processors)
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Resize to `size`x`size` (bicubic, no crop), scale to [0, 1], normalize
/// with CLIP mean/std and lay out as NCHW `[1, 3, size, size]`.
pub fn preprocess_image(image: &DynamicImage, size: u32) -> Array4<f32> {
    let resized = if image.dimensions() == (size, size) {
        image.clone()
    } else {
        image.resize_exact(size, size, FilterType::CatmullRom)
    };
    let rgb = resized.to_rgb8();

    let side = size as usize;
    let mut tensor = Array4::zeros((1, 3, side, side));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let normalized = (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            tensor[[0, c, y as usize, x as usize]] = normalized;
        }
    }

    tensor
}
