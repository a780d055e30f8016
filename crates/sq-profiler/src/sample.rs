//! Synthetic PDF builder for tests and benches.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};

/// An image placed on a sample page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleImage {
    pub width: u32,
    pub height: u32,
    /// When false, only the dimensions are declared and the stream body is a
    /// single byte. Enough for profiling, not decodable.
    pub materialized: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SamplePage {
    pub text: Option<String>,
    pub images: Vec<SampleImage>,
}

/// Builder for small, structurally valid PDFs.
#[derive(Debug, Clone, Default)]
pub struct SamplePdf {
    pages: Vec<SamplePage>,
    compressed: bool,
    padding: usize,
}

impl SamplePdf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: SamplePage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn text_page(self, text: impl Into<String>) -> Self {
        self.page(SamplePage { text: Some(text.into()), images: Vec::new() })
    }

    /// A page holding decodable RGB images and no text.
    pub fn image_page(self, dims: &[(u32, u32)]) -> Self {
        let images = dims
            .iter()
            .map(|&(width, height)| SampleImage { width, height, materialized: true })
            .collect();
        self.page(SamplePage { text: None, images })
    }

    /// A page that declares an image of the given size without pixel data.
    pub fn declared_image_page(self, width: u32, height: u32) -> Self {
        let images = vec![SampleImage { width, height, materialized: false }];
        self.page(SamplePage { text: None, images })
    }

    /// Flate-compress every stream on build.
    pub fn compressed(mut self, yes: bool) -> Self {
        self.compressed = yes;
        self
    }

    /// Append a highly redundant unreferenced stream of `bytes` length.
    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, String> {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for (page_no, page) in self.pages.iter().enumerate() {
            let mut ops = Vec::new();
            let mut xobjects = lopdf::Dictionary::new();

            for (i, image) in page.images.iter().enumerate() {
                let name = format!("Im{}", i + 1);
                let image_id = doc.add_object(image_stream(image, (page_no * 31 + i) as u32));
                xobjects.set(name.as_bytes().to_vec(), image_id);
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![200.into(), 0.into(), 0.into(), 200.into(), 50.into(), (50 + 210 * i as i64).into()],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                ops.push(Operation::new("Q", vec![]));
            }

            if let Some(text) = &page.text {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                ops.push(Operation::new("Td", vec![72.into(), 720.into()]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(text.as_str())]));
                ops.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations: ops }.encode().map_err(|e| e.to_string())?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if self.padding > 0 {
            let filler = b"squeeze padding ".iter().copied().cycle().take(self.padding).collect::<Vec<u8>>();
            let filler_id = doc.add_object(Stream::new(dictionary! {}, filler));
            doc.trailer.set("SqueezePadding", filler_id);
        }

        if self.compressed {
            doc.compress();
        }

        let mut out = Vec::new();
        doc.save_to(&mut out).map_err(|e| e.to_string())?;
        Ok(out)
    }
}

fn image_stream(image: &SampleImage, seed: u32) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    let body = if image.materialized {
        noisy_rgb(image.width, image.height, seed)
    } else {
        vec![0]
    };
    Stream::new(dict, body)
}

/// Gradient plus pseudo-random noise: compresses poorly with flate, well
/// with JPEG.
pub fn noisy_rgb(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            for channel in 0..3u32 {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (state >> 16) & 0x3f;
                let base = (x * 255 / width.max(1) + y * 127 / height.max(1) + channel * 40) & 0xff;
                out.push(((base + noise) & 0xff) as u8);
            }
        }
    }
    out
}
