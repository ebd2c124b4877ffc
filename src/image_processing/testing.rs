//! Fake capabilities and fixtures shared by the unit tests.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::path::{Path, PathBuf};

use super::annotate::TextRenderer;
use super::geometry::GeometryBackend;
use super::metadata::{MetadataProbe, ProbeOutput};
use crate::error::{GeometryError, MetadataError};

/// Write a solid-color JPEG of the given size and return its path
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32, color: Rgb<u8>) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, color)
        .save(&path)
        .unwrap();
    path
}

/// Write a solid JPEG whose APP13 block carries `caption` as IPTC
/// Caption/Abstract (2:120), laid out the way Photoshop and Picasa store it
pub fn write_jpeg_with_iptc_caption(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    caption: &str,
) -> PathBuf {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 90)
        .encode_image(&RgbImage::from_pixel(width, height, Rgb([90, 90, 90])))
        .unwrap();

    // IIM datasets: record version, then the caption
    let mut iim = vec![0x1C, 0x02, 0x00, 0x00, 0x02, 0x00, 0x04];
    iim.extend_from_slice(&[0x1C, 0x02, 0x78]);
    iim.extend_from_slice(&(caption.len() as u16).to_be_bytes());
    iim.extend_from_slice(caption.as_bytes());

    // Photoshop image resource 0x0404 with an empty name
    let mut resource = b"8BIM".to_vec();
    resource.extend_from_slice(&[0x04, 0x04, 0x00, 0x00]);
    resource.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    resource.extend_from_slice(&iim);
    if iim.len() % 2 == 1 {
        resource.push(0);
    }

    let mut payload = b"Photoshop 3.0\0".to_vec();
    payload.extend_from_slice(&resource);

    let mut segment = vec![0xFF, 0xED];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(&payload);

    // Keep SOI and the JFIF APP0 segment first
    let mut insert_at = 2;
    if encoded[2..4] == [0xFF, 0xE0] {
        insert_at = 4 + u16::from_be_bytes([encoded[4], encoded[5]]) as usize;
    }
    encoded.splice(insert_at..insert_at, segment);

    let path = dir.join(name);
    std::fs::write(&path, encoded).unwrap();
    path
}

/// Probe answering from a table keyed by file name
#[derive(Default)]
pub struct StaticProbe {
    outputs: HashMap<String, ProbeOutput>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, output: ProbeOutput) -> Self {
        self.outputs.insert(file_name.to_string(), output);
        self
    }
}

impl MetadataProbe for StaticProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput, MetadataError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.outputs
            .get(&name)
            .cloned()
            .ok_or_else(|| MetadataError::Malformed {
                path: path.to_path_buf(),
                reason: "no probe output".to_string(),
            })
    }
}

/// Backend whose tools always exit with status 1
pub struct FailingBackend;

impl GeometryBackend for FailingBackend {
    fn pad(
        &self,
        _src: &Path,
        _dst: &Path,
        _width: u32,
        _height: u32,
        _background: Rgb<u8>,
    ) -> Result<(), GeometryError> {
        Err(GeometryError::ToolFailed {
            step: "pad",
            status: 1,
            stderr: "pad failed".to_string(),
        })
    }

    fn resize(&self, _src: &Path, _dst: &Path, _width: u32, _height: u32) -> Result<(), GeometryError> {
        Err(GeometryError::ToolFailed {
            step: "resize",
            status: 1,
            stderr: "resize failed".to_string(),
        })
    }
}

/// Backend whose tools succeed without writing anything
pub struct SilentBackend;

impl GeometryBackend for SilentBackend {
    fn pad(
        &self,
        _src: &Path,
        _dst: &Path,
        _width: u32,
        _height: u32,
        _background: Rgb<u8>,
    ) -> Result<(), GeometryError> {
        Ok(())
    }

    fn resize(&self, _src: &Path, _dst: &Path, _width: u32, _height: u32) -> Result<(), GeometryError> {
        Ok(())
    }
}

/// Renders every character as a solid `char_width`x`height` block
pub struct BlockRenderer {
    char_width: u32,
    height: u32,
}

impl BlockRenderer {
    pub fn new(char_width: u32, height: u32) -> Self {
        Self { char_width, height }
    }
}

impl TextRenderer for BlockRenderer {
    fn measure(&self, text: &str) -> (u32, u32) {
        (text.chars().count() as u32 * self.char_width, self.height)
    }

    fn draw(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        let (width, height) = self.measure(text);
        if width > 0 && height > 0 {
            draw_filled_rect_mut(image, Rect::at(x, y).of_size(width, height), color);
        }
    }
}

/// Block renderer that also keeps every text it was asked to draw
pub struct RecordingRenderer {
    blocks: BlockRenderer,
    drawn: Rc<RefCell<Vec<String>>>,
}

impl RecordingRenderer {
    pub fn new(drawn: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            blocks: BlockRenderer::new(1, 6),
            drawn,
        }
    }
}

impl TextRenderer for RecordingRenderer {
    fn measure(&self, text: &str) -> (u32, u32) {
        self.blocks.measure(text)
    }

    fn draw(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        self.drawn.borrow_mut().push(text.to_string());
        self.blocks.draw(image, x, y, text, color);
    }
}
