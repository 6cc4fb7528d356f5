use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::detect::Face;

/// Eye positions of the canonical 112x112 ArcFace crop.
const REF_LEFT_EYE: (f32, f32) = (38.2946, 51.6963);
const REF_RIGHT_EYE: (f32, f32) = (73.5318, 51.5014);
const REF_SIZE: f32 = 112.0;

/// Rotation + uniform scale + translation mapping source pixels onto the crop:
/// `out = [[a, b], [-b, a]] * in + t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Map the eyes exactly onto the reference positions of a `size` crop.
    pub fn from_eyes(left: (f32, f32), right: (f32, f32), size: u32) -> Self {
        let k = size as f32 / REF_SIZE;
        let ref_left = (REF_LEFT_EYE.0 * k, REF_LEFT_EYE.1 * k);
        let ref_right = (REF_RIGHT_EYE.0 * k, REF_RIGHT_EYE.1 * k);

        let (dx, dy) = (right.0 - left.0, right.1 - left.1);
        let (rdx, rdy) = (ref_right.0 - ref_left.0, ref_right.1 - ref_left.1);
        let eye_dist = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
        let scale = (rdx * rdx + rdy * rdy).sqrt() / eye_dist;
        let angle = dy.atan2(dx) - rdy.atan2(rdx);

        let a = scale * angle.cos();
        let b = scale * angle.sin();
        let center = ((left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0);
        let ref_center = ((ref_left.0 + ref_right.0) / 2.0, (ref_left.1 + ref_right.1) / 2.0);

        Self {
            a,
            b,
            tx: ref_center.0 - (a * center.0 + b * center.1),
            ty: ref_center.1 - (-b * center.0 + a * center.1),
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.tx,
            -self.b * x + self.a * y + self.ty,
        )
    }

    pub fn invert(&self, x: f32, y: f32) -> (f32, f32) {
        let det = self.a * self.a + self.b * self.b;
        let (u, v) = (x - self.tx, y - self.ty);
        ((self.a * u - self.b * v) / det, (self.b * u + self.a * v) / det)
    }
}

/// Crop `face` out of `img` as a `size`x`size` eye-aligned image.
pub fn align_face(img: &DynamicImage, face: &Face, size: u32) -> DynamicImage {
    let transform = Similarity::from_eyes(face.left_eye(), face.right_eye(), size);
    let mut out = RgbImage::new(size, size);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = transform.invert(x as f32, y as f32);
        if let Some(rgb) = sample_bilinear(img, sx, sy) {
            *pixel = rgb;
        }
    }
    DynamicImage::ImageRgb8(out)
}

fn sample_bilinear(img: &DynamicImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    if x < 0.0 || y < 0.0 || x >= w as f32 || y >= h as f32 {
        return None;
    }
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let corners = [
        (img.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (img.get_pixel(x1, y0), fx * (1.0 - fy)),
        (img.get_pixel(x0, y1), (1.0 - fx) * fy),
        (img.get_pixel(x1, y1), fx * fy),
    ];
    let mut rgb = [0u8; 3];
    for (c, value) in rgb.iter_mut().enumerate() {
        let v: f32 = corners.iter().map(|(p, weight)| p[c] as f32 * weight).sum();
        *value = v.round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(rgb))
}
