//! # PDF Serializer
//!
//! Takes one [`PageDrawing`] from the render pass and writes a single-page
//! PDF file.
//!
//! This is a from-scratch PDF 1.7 writer. Text uses the standard Type1
//! fonts with WinAnsiEncoding, so nothing is embedded; images become image
//! XObjects (JPEG passed through with DCTDecode, everything else as
//! FlateDecode RGB with an optional SMask for alpha).
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```

use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>
use std::sync::Arc;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::PdsError;
use crate::font::StandardFont;
use crate::image_loader::{ImagePixelData, JpegColorSpace, LoadedImage};
use crate::render::{DrawCommand, PageDrawing};

#[derive(Debug, Default, Clone)]
pub struct PdfWriter {
    title: Option<String>,
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<Vec<u8>>,
    /// Font resource index is the position in this list.
    font_objects: Vec<(StandardFont, usize)>,
    /// Image resource index is the position in this list.
    image_objects: Vec<(Arc<LoadedImage>, usize)>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(data);
        self.objects.len() - 1
    }

    fn font_index(&self, font: StandardFont) -> usize {
        self.font_objects
            .iter()
            .position(|(f, _)| *f == font)
            .unwrap_or(0)
    }

    fn image_index(&self, image: &Arc<LoadedImage>) -> Option<usize> {
        self.image_objects
            .iter()
            .position(|(i, _)| Arc::ptr_eq(i, image))
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document title written to the Info dictionary.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Write one page to a PDF byte vector.
    pub fn write(&self, page: &PageDrawing) -> Result<Vec<u8>, PdsError> {
        if !(page.width > 0.0 && page.height > 0.0) {
            return Err(PdsError::Render(format!(
                "page size must be positive, got {}x{}",
                page.width, page.height
            )));
        }

        // 0 = placeholder (PDF objects are 1-indexed), 1 = Catalog, 2 = Pages
        let mut builder = PdfBuilder {
            objects: vec![Vec::new(), Vec::new(), Vec::new()],
            font_objects: Vec::new(),
            image_objects: Vec::new(),
        };

        self.register_fonts(&mut builder, page);
        self.register_images(&mut builder, page);

        let content = self.build_content_stream(page, &builder);
        let compressed = compress_to_vec_zlib(content.as_bytes(), 6);
        let mut content_data: Vec<u8> = Vec::new();
        let _ = write!(
            content_data,
            "<< /Length {} /Filter /FlateDecode >>\nstream\n",
            compressed.len()
        );
        content_data.extend_from_slice(&compressed);
        content_data.extend_from_slice(b"\nendstream");
        let content_obj_id = builder.push(content_data);

        let mut resources = format!("/Font << {} >>", Self::font_resource_dict(&builder));
        if !builder.image_objects.is_empty() {
            let _ = write!(resources, " /XObject << {} >>", Self::xobject_resource_dict(&builder));
        }
        let page_dict = format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
             /Contents {} 0 R /Resources << {} >> >>",
            page.width, page.height, content_obj_id, resources
        );
        let page_obj_id = builder.push(page_dict.into_bytes());

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        builder.objects[2] =
            format!("<< /Type /Pages /Kids [{} 0 R] /Count 1 >>", page_obj_id).into_bytes();

        let mut info = String::from("<< ");
        if let Some(ref title) = self.title {
            let _ = write!(info, "/Title ({}) ", Self::encode_text(title));
        }
        let _ = write!(info, "/Producer (pdsgen {}) >>", env!("CARGO_PKG_VERSION"));
        let info_obj_id = builder.push(info.into_bytes());

        Ok(self.serialize(&builder, info_obj_id))
    }

    /// One Type1 font object per distinct font on the page, in a fixed order.
    /// Helvetica is always present.
    fn register_fonts(&self, builder: &mut PdfBuilder, page: &PageDrawing) {
        let mut fonts: Vec<StandardFont> = page
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { font, .. } => Some(*font),
                _ => None,
            })
            .collect();
        fonts.push(StandardFont::Helvetica);
        fonts.sort();
        fonts.dedup();

        for font in fonts {
            let dict = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                font.pdf_name()
            );
            let id = builder.push(dict.into_bytes());
            builder.font_objects.push((font, id));
        }
    }

    /// One XObject per distinct image (the same `Arc` drawn twice is stored
    /// once).
    fn register_images(&self, builder: &mut PdfBuilder, page: &PageDrawing) {
        for command in &page.commands {
            if let DrawCommand::Image { image, .. } = command {
                if builder.image_index(image).is_none() {
                    let id = Self::write_image_xobject(builder, image);
                    builder.image_objects.push((image.clone(), id));
                }
            }
        }
    }

    fn build_content_stream(&self, page: &PageDrawing, builder: &PdfBuilder) -> String {
        let mut stream = String::new();
        for command in &page.commands {
            match command {
                DrawCommand::FillRect {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => {
                    let _ = write!(
                        stream,
                        "q\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                        color.r, color.g, color.b, x, y, width, height
                    );
                }
                DrawCommand::Text {
                    x,
                    y,
                    font,
                    size,
                    color,
                    text,
                } => {
                    let _ = write!(
                        stream,
                        "BT\n{:.3} {:.3} {:.3} rg\n/F{} {:.2} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
                        color.r,
                        color.g,
                        color.b,
                        builder.font_index(*font),
                        size,
                        x,
                        y,
                        Self::encode_text(text)
                    );
                }
                DrawCommand::Image {
                    x,
                    y,
                    width,
                    height,
                    image,
                } => {
                    if let Some(idx) = builder.image_index(image) {
                        let _ = write!(
                            stream,
                            "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                            width, height, x, y, idx
                        );
                    }
                }
            }
        }
        stream
    }

    /// Write a single image as one or two XObject PDF objects.
    /// Returns the main XObject ID.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                    JpegColorSpace::DeviceCMYK { inverted: false } => "/DeviceCMYK",
                    JpegColorSpace::DeviceCMYK { inverted: true } => {
                        "/DeviceCMYK /Decode [1 0 1 0 1 0 1 0]"
                    }
                };
                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace {} /BitsPerComponent 8 /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                );
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                let smask_id = alpha.as_ref().map(|alpha_data| {
                    let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                    let mut smask_data: Vec<u8> = Vec::new();
                    let _ = write!(
                        smask_data,
                        "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                         /ColorSpace /DeviceGray /BitsPerComponent 8 \
                         /Filter /FlateDecode /Length {} >>\nstream\n",
                        image.width_px,
                        image.height_px,
                        compressed_alpha.len()
                    );
                    smask_data.extend_from_slice(&compressed_alpha);
                    smask_data.extend_from_slice(b"\nendstream");
                    builder.push(smask_data)
                });

                let compressed_rgb = compress_to_vec_zlib(rgb, 6);
                let smask_ref = smask_id
                    .map(|id| format!(" /SMask {} 0 R", id))
                    .unwrap_or_default();
                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /DeviceRGB /BitsPerComponent 8 \
                     /Filter /FlateDecode /Length {}{} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_rgb.len(),
                    smask_ref
                );
                obj_data.extend_from_slice(&compressed_rgb);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }
        }
    }

    fn font_resource_dict(builder: &PdfBuilder) -> String {
        builder
            .font_objects
            .iter()
            .enumerate()
            .map(|(i, (_, obj_id))| format!("/F{} {} 0 R", i, obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn xobject_resource_dict(builder: &PdfBuilder) -> String {
        builder
            .image_objects
            .iter()
            .enumerate()
            .map(|(i, (_, obj_id))| format!("/Im{} {} 0 R", i, obj_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Encode text as the body of a PDF literal string in WinAnsiEncoding.
    /// Characters outside the encoding become `?`.
    fn encode_text(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            let b = Self::unicode_to_winansi(ch).unwrap_or(b'?');
            match b {
                b'\\' => out.push_str("\\\\"),
                b'(' => out.push_str("\\("),
                b')' => out.push_str("\\)"),
                0x20..=0x7E => out.push(b as char),
                // octal escape for bytes outside ASCII printable range
                _ => {
                    let _ = write!(out, "\\{:03o}", b);
                }
            }
        }
        out
    }

    /// Map a Unicode codepoint to a WinAnsiEncoding byte value.
    ///
    /// WinAnsiEncoding is based on Windows-1252. Most codepoints in
    /// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
    /// contains special mappings for smart quotes, bullets, dashes, etc.
    fn unicode_to_winansi(ch: char) -> Option<u8> {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
            return Some(cp as u8);
        }
        match cp {
            0x20AC => Some(0x80), // Euro sign
            0x201A => Some(0x82), // Single low-9 quotation mark
            0x0192 => Some(0x83), // Latin small letter f with hook
            0x201E => Some(0x84), // Double low-9 quotation mark
            0x2026 => Some(0x85), // Horizontal ellipsis
            0x2020 => Some(0x86), // Dagger
            0x2021 => Some(0x87), // Double dagger
            0x02C6 => Some(0x88), // Modifier letter circumflex accent
            0x2030 => Some(0x89), // Per mille sign
            0x0160 => Some(0x8A), // Latin capital letter S with caron
            0x2039 => Some(0x8B), // Single left-pointing angle quotation
            0x0152 => Some(0x8C), // Latin capital ligature OE
            0x017D => Some(0x8E), // Latin capital letter Z with caron
            0x2018 => Some(0x91), // Left single quotation mark
            0x2019 => Some(0x92), // Right single quotation mark
            0x201C => Some(0x93), // Left double quotation mark
            0x201D => Some(0x94), // Right double quotation mark
            0x2022 => Some(0x95), // Bullet
            0x2013 => Some(0x96), // En dash
            0x2014 => Some(0x97), // Em dash
            0x02DC => Some(0x98), // Small tilde
            0x2122 => Some(0x99), // Trade mark sign
            0x0161 => Some(0x9A), // Latin small letter s with caron
            0x203A => Some(0x9B), // Single right-pointing angle quotation
            0x0153 => Some(0x9C), // Latin small ligature oe
            0x017E => Some(0x9E), // Latin small letter z with caron
            0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
            _ => None,
        }
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(obj);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    fn content_stream(pdf: &[u8]) -> String {
        let marker = b"/Filter /FlateDecode >>\nstream\n";
        let start = pdf
            .windows(marker.len())
            .position(|w| w == marker)
            .map(|p| p + marker.len())
            .unwrap();
        let len = pdf[start..]
            .windows(10)
            .position(|w| w == b"\nendstream")
            .unwrap();
        let raw = decompress_to_vec_zlib(&pdf[start..start + len]).unwrap();
        String::from_utf8(raw).unwrap()
    }

    fn text(font: StandardFont, s: &str) -> DrawCommand {
        DrawCommand::Text {
            x: 10.0,
            y: 20.0,
            font,
            size: 12.0,
            color: Color::BLACK,
            text: s.to_string(),
        }
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(PdfWriter::encode_text("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(PdfWriter::encode_text("back\\slash"), "back\\\\slash");
        assert_eq!(PdfWriter::encode_text("Zoë"), "Zo\\353");
        // not in WinAnsi
        assert_eq!(PdfWriter::encode_text("Łódź"), "?\\363d?");
    }

    #[test]
    fn test_empty_page_produces_valid_pdf() {
        let bytes = PdfWriter::new().write(&PageDrawing::new(595.0, 842.0)).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/MediaBox [0 0 595.00 842.00]"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/BaseFont /Helvetica "));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut page = PageDrawing::new(595.0, 842.0);
        page.commands.push(text(StandardFont::HelveticaBold, "x"));
        let bytes = PdfWriter::new().write(&page).unwrap();
        let xref = bytes.windows(5).rposition(|w| w == b"xref\n").unwrap();
        let table = String::from_utf8(bytes[xref..].to_vec()).unwrap();
        let entries: Vec<&str> = table
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .collect();
        assert!(entries.len() >= 5);
        for (i, line) in entries.iter().enumerate() {
            let offset: usize = line[..10].parse().unwrap();
            let header = format!("{} 0 obj", i + 1);
            assert!(bytes[offset..].starts_with(header.as_bytes()));
        }
    }

    #[test]
    fn test_fonts_registered_once_each() {
        let mut page = PageDrawing::new(595.0, 842.0);
        page.commands.push(text(StandardFont::Helvetica, "a"));
        page.commands.push(text(StandardFont::HelveticaBold, "b"));
        page.commands.push(text(StandardFont::HelveticaBold, "c"));
        let bytes = PdfWriter::new().write(&page).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert_eq!(text.matches("/BaseFont /Helvetica-Bold").count(), 1);
        assert_eq!(text.matches("/Subtype /Type1").count(), 2);
        let content = content_stream(&bytes);
        assert!(content.contains("/F0 12.00 Tf"));
        assert!(content.contains("/F1 12.00 Tf\n10.00 20.00 Td\n(b) Tj"));
    }

    #[test]
    fn test_image_xobject_with_smask_written_once() {
        let image = Arc::new(LoadedImage {
            pixel_data: ImagePixelData::Decoded {
                rgb: vec![255, 0, 0],
                alpha: Some(vec![128]),
            },
            width_px: 1,
            height_px: 1,
        });
        let mut page = PageDrawing::new(200.0, 200.0);
        for x in [0.0, 50.0] {
            page.commands.push(DrawCommand::Image {
                x,
                y: 10.0,
                width: 40.0,
                height: 20.0,
                image: image.clone(),
            });
        }
        let bytes = PdfWriter::new().write(&page).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert_eq!(text.matches("/Subtype /Image").count(), 2); // image + smask
        assert!(text.contains("/SMask"));
        assert!(text.contains("/XObject << /Im0"));
        let content = content_stream(&bytes);
        assert_eq!(content.matches("/Im0 Do").count(), 2);
        assert!(content.contains("40.0000 0 0 20.0000 50.00 10.00 cm"));
    }

    #[test]
    fn test_cmyk_jpeg_keeps_its_color_space() {
        let image = Arc::new(LoadedImage {
            pixel_data: ImagePixelData::Jpeg {
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
                color_space: JpegColorSpace::DeviceCMYK { inverted: true },
            },
            width_px: 1,
            height_px: 1,
        });
        let mut page = PageDrawing::new(100.0, 100.0);
        page.commands.push(DrawCommand::Image {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            image,
        });
        let bytes = PdfWriter::new().write(&page).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/ColorSpace /DeviceCMYK /Decode [1 0 1 0 1 0 1 0]"));
        assert!(!text.contains("/DeviceRGB"));
    }

    #[test]
    fn test_title_in_info() {
        let bytes = PdfWriter::new()
            .with_title("Jan (1)")
            .write(&PageDrawing::new(100.0, 100.0))
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Title (Jan \\(1\\))"));
        assert!(text.contains("/Info "));
    }

    #[test]
    fn test_rejects_empty_page_size() {
        assert!(PdfWriter::new().write(&PageDrawing::new(0.0, 842.0)).is_err());
    }
}
