//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps small form labels and checkbox marks crisp; JPEG artefacts around
//! thin text cost accuracy on the faint fields of a Form 1004 scan.
//! `detail: "high"` asks the provider to tile the page instead of sending a
//! single low-resolution overview.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a base64 PNG ready for the VLM request.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} page → {} bytes base64", img.width(), img.height(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 8, Rgba([255, 255, 255, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
