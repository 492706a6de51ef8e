// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for integration tests
#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dual_caption_node::vision::{
    BackendConfig, BackendId, CaptionBackend, CaptionHost, ComputeDevice,
};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageBuffer, ImageEncoder, ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

mockall::mock! {
    pub Backend {}

    impl CaptionBackend for Backend {
        fn id(&self) -> BackendId;
        fn config(&self) -> BackendConfig;
        fn caption(
            &self,
            image: &DynamicImage,
            prompt: &str,
            max_new_tokens: Option<usize>,
        ) -> anyhow::Result<String>;
    }
}

/// Backend with identity and config but no caption expectations
pub fn bare_backend(id: BackendId, device: ComputeDevice) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_id().return_const(id);
    backend
        .expect_config()
        .return_const(BackendConfig::for_backend(id, device));
    backend
}

/// Backend that answers with a fixed caption
pub fn fixed_backend(id: BackendId, device: ComputeDevice, caption: &str) -> MockBackend {
    let caption = caption.to_string();
    let mut backend = bare_backend(id, device);
    backend
        .expect_caption()
        .returning(move |_, _, _| Ok(caption.clone()));
    backend
}

/// Backend that records every call it receives
pub fn recording_backend(
    id: BackendId,
    device: ComputeDevice,
    calls: Arc<Mutex<Vec<(String, Option<usize>, (u32, u32))>>>,
) -> MockBackend {
    let mut backend = bare_backend(id, device);
    backend
        .expect_caption()
        .returning(move |image, prompt, max_new_tokens| {
            calls.lock().unwrap().push((
                prompt.to_string(),
                max_new_tokens,
                (image.width(), image.height()),
            ));
            Ok(format!("{} says: {}", id.key(), prompt))
        });
    backend
}

/// Host backed by two fixed-caption mocks
pub fn mock_host(device: ComputeDevice, blip: &str, blip2: &str) -> CaptionHost {
    CaptionHost::from_backends(
        Box::new(fixed_backend(BackendId::Blip, device, blip)),
        Box::new(fixed_backend(BackendId::Blip2, device, blip2)),
    )
}

/// Solid gray image encoded in `format`
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |_, _| Rgb([128u8, 128u8, 128u8]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// RGB noise encoded as PNG; noise keeps the file close to its raw size
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    let pixels: Vec<u8> = (0..width * height * 3)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();

    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, PngFilter::NoFilter)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buffer
}

pub fn png_bytes() -> Vec<u8> {
    encoded_image(32, 24, ImageFormat::Png)
}

pub fn png_base64() -> String {
    STANDARD.encode(png_bytes())
}

/// Encode a multipart/form-data body; each part is (name, file name, data)
pub fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
