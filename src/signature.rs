// 署名画像の正規化: 任意エンコーディング -> PDF埋め込み可能な形へ

use std::io::Cursor;

use image::{DynamicImage, RgbImage};

use crate::error::PdfSignError;

/// デコード・エンコード済みの署名画像。
///
/// 一度準備すれば全ページで再利用できる（ページごとのコピー不要）。
/// RGBベースはDCTDecode (JPEG)、アルファチャンネルがあれば
/// FlateDecodeの8bitグレーSMaskとして保持する。
#[derive(Debug, Clone)]
pub struct PreparedImage {
    width: u32,
    height: u32,
    jpeg_data: Vec<u8>,
    smask_flate: Option<Vec<u8>>,
}

impl PreparedImage {
    /// 生の画像バイト列（PNG/JPEG等）をデコードして準備する。
    ///
    /// アルファチャンネルは透過合成のために保持する。デコードできない
    /// バイト列は `UnsupportedImageFormat` になる。
    pub fn prepare(raw_bytes: &[u8], jpeg_quality: u8) -> crate::error::Result<Self> {
        if !(1..=100).contains(&jpeg_quality) {
            return Err(PdfSignError::config(format!(
                "JPEG quality must be 1-100, got {jpeg_quality}"
            )));
        }

        let reader = image::ImageReader::new(Cursor::new(raw_bytes))
            .with_guessed_format()
            .map_err(|e| {
                PdfSignError::unsupported_image(format!("cannot probe image format: {e}"))
            })?;
        let decoded = reader
            .decode()
            .map_err(|e| PdfSignError::unsupported_image(e.to_string()))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(PdfSignError::unsupported_image(
                "image has zero width or height",
            ));
        }

        // アルファ平面: 全ピクセル不透明ならSMaskは不要
        let alpha: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let smask_flate = if alpha.iter().any(|&a| a < 255) {
            Some(flate_encode(&alpha)?)
        } else {
            None
        };

        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
        let jpeg_data = encode_rgb_to_jpeg(&rgb, jpeg_quality)?;

        Ok(PreparedImage {
            width,
            height,
            jpeg_data,
            smask_flate,
        })
    }

    /// ネイティブのピクセル幅。
    pub fn width(&self) -> u32 {
        self.width
    }

    /// ネイティブのピクセル高さ。
    pub fn height(&self) -> u32 {
        self.height
    }

    /// アスペクト比 (height / width)。配置高さの導出に使用する。
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }

    /// DCTDecode用のJPEGバイト列。
    pub fn jpeg_data(&self) -> &[u8] {
        &self.jpeg_data
    }

    /// FlateDecode済みのSMaskデータ（アルファチャンネルがある場合のみ）。
    pub fn smask_flate(&self) -> Option<&[u8]> {
        self.smask_flate.as_deref()
    }
}

/// RGB画像をJPEGバイト列にエンコードする。
fn encode_rgb_to_jpeg(rgb: &RgbImage, quality: u8) -> crate::error::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;

    Ok(buf.into_inner())
}

/// zlibで圧縮 (PDF FlateDecode)
fn flate_encode(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfSignError::unsupported_image(format!("Flate encode error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| PdfSignError::unsupported_image(format!("Flate encode error: {e}")))
}
