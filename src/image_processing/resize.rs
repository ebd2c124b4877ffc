use fast_image_resize::{images::Image, ResizeOptions, Resizer};
use image::{imageops, Rgb, RgbImage};
use std::num::NonZeroU32;

use crate::error::GeometryError;

/// Canvas size that holds a `width`x`height` image at the `goal_width`:`goal_height` ratio.
///
/// Only one side ever grows, and never shrinks, so the source always fits.
/// Integer arithmetic keeps exact-ratio sources exactly unchanged.
pub fn padded_canvas(width: u32, height: u32, goal_width: u32, goal_height: u32) -> (u32, u32) {
    let (width, height) = (width as u64, height as u64);
    let (goal_width, goal_height) = (goal_width.max(1) as u64, goal_height.max(1) as u64);

    if width * goal_height > height * goal_width {
        // Source is wider - grow height
        let new_height = (width * goal_height).div_ceil(goal_width);
        (width as u32, new_height.max(height) as u32)
    } else {
        // Source is taller - grow width
        let new_width = (height * goal_width).div_ceil(goal_height);
        (new_width.max(width) as u32, height as u32)
    }
}

/// Center `img` on a canvas of the given size filled with `background`
pub fn pad_image(img: &RgbImage, canvas_width: u32, canvas_height: u32, background: Rgb<u8>) -> RgbImage {
    let (src_width, src_height) = img.dimensions();
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, background);

    let offset_x = (canvas_width.saturating_sub(src_width) / 2) as i64;
    let offset_y = (canvas_height.saturating_sub(src_height) / 2) as i64;
    imageops::overlay(&mut canvas, img, offset_x, offset_y);

    canvas
}

/// Resize an image to exact dimensions using high-quality algorithm
pub fn resize_image(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage, GeometryError> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let non_zero = |value: u32, what: &str| {
        NonZeroU32::new(value).ok_or_else(|| GeometryError::Resize(format!("{} is zero", what)))
    };
    let src_width_nz = non_zero(src_width, "source width")?;
    let src_height_nz = non_zero(src_height, "source height")?;
    let dst_width_nz = non_zero(width, "target width")?;
    let dst_height_nz = non_zero(height, "target height")?;

    let src_image = Image::from_vec_u8(
        src_width_nz.get(),
        src_height_nz.get(),
        img.as_raw().clone(),
        fast_image_resize::PixelType::U8x3,
    )
    .map_err(|e| GeometryError::Resize(e.to_string()))?;

    let mut dst_image = Image::new(
        dst_width_nz.get(),
        dst_height_nz.get(),
        fast_image_resize::PixelType::U8x3,
    );

    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, Some(&ResizeOptions::default()))
        .map_err(|e| GeometryError::Resize(e.to_string()))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| GeometryError::Resize("resized buffer has unexpected length".to_string()))
}
