use image::RgbImage;
use ndarray::Array4;

/// Pack an RGB image into a `[1, 3, H, W]` BGR tensor with values in `[0, 255]`,
/// the layout both YuNet and SFace expect.
pub(crate) fn bgr_planar(img: &RgbImage) -> Array4<f32> {
    let (width, height) = img.dimensions();
    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| img.get_pixel(x as u32, y as u32)[2 - channel] as f32,
    )
}
