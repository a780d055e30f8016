//! Direct image recompression: every 8-bit RGB or gray image is re-encoded
//! as JPEG at the requested quality. A re-encode is kept only when it is
//! smaller than the stored stream.

use crate::cancel::{run_blocking, CancelFlag};
use crate::traits::Strategy;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document as PdfDocument, Object, Stream};
use sq_core::{CostClass, Document, StrategyError, StrategyParams};
use std::time::Duration;

pub struct ImageRecoder {
    timeout: Duration,
}

impl ImageRecoder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ImageRecoder {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Flate,
    Jpeg,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channels {
    Rgb,
    Gray,
}

/// Per-run counters, logged once at the end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecodeStats {
    pub images: usize,
    pub recoded: usize,
    pub skipped: usize,
}

fn name_of(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(n) => Some(n.as_slice()),
        Object::Array(items) if items.len() == 1 => name_of(&items[0]),
        _ => None,
    }
}

fn int_entry(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key) {
        Ok(Object::Integer(v)) => Some(*v),
        _ => None,
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

fn encoding(dict: &Dictionary) -> Encoding {
    match dict.get(b"Filter") {
        Err(_) => Encoding::Raw,
        Ok(filter) => match name_of(filter) {
            Some(b"FlateDecode") => Encoding::Flate,
            Some(b"DCTDecode") => Encoding::Jpeg,
            _ => Encoding::Unsupported,
        },
    }
}

fn channels(dict: &Dictionary) -> Option<Channels> {
    match dict.get(b"ColorSpace").ok().and_then(name_of) {
        Some(b"DeviceRGB") => Some(Channels::Rgb),
        Some(b"DeviceGray") => Some(Channels::Gray),
        _ => None,
    }
}

fn decode(stream: &Stream, enc: Encoding, ch: Channels) -> Result<Option<DynamicImage>, StrategyError> {
    let dict = &stream.dict;
    let (Some(width), Some(height)) = (int_entry(dict, b"Width"), int_entry(dict, b"Height")) else {
        return Ok(None);
    };
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Ok(None);
    };

    if enc == Encoding::Jpeg {
        let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| StrategyError::Image(e.to_string()))?;
        return Ok(Some(img));
    }

    // Predictor-encoded and sub-byte samples are left alone.
    if int_entry(dict, b"BitsPerComponent") != Some(8) || dict.has(b"DecodeParms") {
        return Ok(None);
    }
    let raw = match enc {
        Encoding::Flate => stream
            .decompressed_content()
            .map_err(|e| StrategyError::Pdf(e.to_string()))?,
        _ => stream.content.clone(),
    };
    let img = match ch {
        Channels::Rgb => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        Channels::Gray => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
    };
    Ok(img)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, StrategyError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    img.write_with_encoder(encoder)
        .map_err(|e| StrategyError::Image(e.to_string()))?;
    Ok(out)
}

/// Returns whether the stream was replaced.
fn recode_stream(stream: &mut Stream, quality: u8) -> Result<bool, StrategyError> {
    if matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Ok(false);
    }
    let enc = encoding(&stream.dict);
    let Some(ch) = channels(&stream.dict) else {
        return Ok(false);
    };
    if enc == Encoding::Unsupported {
        return Ok(false);
    }
    let Some(img) = decode(stream, enc, ch)? else {
        return Ok(false);
    };
    let img = match ch {
        Channels::Rgb => DynamicImage::ImageRgb8(img.to_rgb8()),
        Channels::Gray => DynamicImage::ImageLuma8(img.to_luma8()),
    };

    let encoded = encode_jpeg(&img, quality)?;
    if encoded.len() >= stream.content.len() {
        return Ok(false);
    }
    stream.set_content(encoded);
    stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    stream.dict.remove(b"DecodeParms");
    stream.allows_compression = false;
    Ok(true)
}

pub fn recode_bytes(bytes: &[u8], quality: u8, cancel: &CancelFlag) -> Result<(Vec<u8>, RecodeStats), StrategyError> {
    let mut pdf = PdfDocument::load_mem(bytes).map_err(|e| StrategyError::Pdf(e.to_string()))?;
    let mut stats = RecodeStats::default();

    for object in pdf.objects.values_mut() {
        cancel.check()?;
        let Object::Stream(stream) = object else { continue };
        if !is_image(&stream.dict) {
            continue;
        }
        stats.images += 1;
        match recode_stream(stream, quality) {
            Ok(true) => stats.recoded += 1,
            Ok(false) => {}
            Err(e) => {
                stats.skipped += 1;
                tracing::debug!(error = %e, "image left as is");
            }
        }
    }
    cancel.check()?;

    let mut out = Vec::with_capacity(bytes.len());
    pdf.save_to(&mut out).map_err(|e| StrategyError::Pdf(e.to_string()))?;
    if out.is_empty() {
        return Err(StrategyError::EmptyOutput);
    }
    Ok((out, stats))
}

#[async_trait]
impl Strategy for ImageRecoder {
    fn name(&self) -> &'static str {
        "image-recode"
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Expensive
    }

    fn intrinsic_timeout(&self) -> Duration {
        self.timeout
    }

    async fn compress(
        &self,
        input: &Document,
        params: &StrategyParams,
        cancel: &CancelFlag,
    ) -> Result<Document, StrategyError> {
        let bytes = input.shared_bytes();
        let quality = params.image_quality;
        let (out, stats) = run_blocking(cancel, move |flag| recode_bytes(&bytes, quality, flag)).await?;
        tracing::debug!(
            images = stats.images,
            recoded = stats.recoded,
            skipped = stats.skipped,
            quality,
            "image recode"
        );
        Ok(input.derive(out))
    }
}
