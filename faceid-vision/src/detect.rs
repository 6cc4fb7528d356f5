//! YuNet face detection: letterboxing, grid decoding and overlap suppression.
//!
//! For each stride (8, 16, 32) the detector emits four heads over an
//! `(S / stride)²` grid, in this output order:
//! `cls_8, cls_16, cls_32, obj_8, obj_16, obj_32, bbox_8, .., kps_8, ..`.
//! A cell at `(row, col)` decodes to
//! `cx = (col + dx) * stride`, `w = exp(dw) * stride` (and likewise for y/h),
//! with landmarks `(col + lx) * stride`.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::ArrayView2;
use ort::{session::Session, value::Value};
use serde::Serialize;

use crate::tensor::bgr_planar;

const STRIDES: [usize; 3] = [8, 16, 32];

/// A detected face in source image pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    /// x, y, w, h
    pub bbox: [f32; 4],
    pub score: f32,
    /// left eye, right eye, nose tip, left mouth corner, right mouth corner
    pub landmarks: [[f32; 2]; 5],
}

impl Face {
    pub fn left_eye(&self) -> (f32, f32) {
        (self.landmarks[0][0], self.landmarks[0][1])
    }

    pub fn right_eye(&self) -> (f32, f32) {
        (self.landmarks[1][0], self.landmarks[1][1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Side of the square detector input.
    pub input_size: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
            input_size: 640,
        }
    }
}

/// Aspect-preserving fit of a source image into a square, centered canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    size: u32,
    scale: f32,
    width: u32,
    height: u32,
    offset_x: u32,
    offset_y: u32,
}

impl Letterbox {
    pub(crate) fn fit(src_width: u32, src_height: u32, size: u32) -> Self {
        let scale = size as f32 / src_width.max(src_height).max(1) as f32;
        let width = ((src_width as f32 * scale) as u32).clamp(1, size);
        let height = ((src_height as f32 * scale) as u32).clamp(1, size);
        Self {
            size,
            scale,
            width,
            height,
            offset_x: (size - width) / 2,
            offset_y: (size - height) / 2,
        }
    }

    pub(crate) fn render(&self, img: &DynamicImage) -> RgbImage {
        let resized = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();
        let mut canvas = RgbImage::new(self.size, self.size);
        image::imageops::overlay(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas
    }

    /// Canvas pixel -> source pixel.
    pub(crate) fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        )
    }

    pub(crate) fn restore(&self, face: Face) -> Face {
        let (x, y) = self.to_source(face.bbox[0], face.bbox[1]);
        let mut landmarks = face.landmarks;
        for point in landmarks.iter_mut() {
            let (lx, ly) = self.to_source(point[0], point[1]);
            *point = [lx, ly];
        }
        Face {
            bbox: [x, y, face.bbox[2] / self.scale, face.bbox[3] / self.scale],
            score: face.score,
            landmarks,
        }
    }
}

/// Run the detector on `img` and return faces in source coordinates, best first.
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    params: &DetectorParams,
) -> Result<Vec<Face>> {
    let (width, height) = img.dimensions();
    let letterbox = Letterbox::fit(width, height, params.input_size);
    let canvas = letterbox.render(img);

    let input = Value::from_array(bgr_planar(&canvas))?;
    let outputs = session.run(ort::inputs![input])?;

    let mut heads: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        heads.push((shape.iter().copied().collect(), data.to_vec()));
    }

    let faces = decode(&heads, params.input_size as usize, params.score_threshold)
        .context("decoding detector output")?
        .into_iter()
        .map(|face| letterbox.restore(face))
        .collect();

    Ok(suppress_overlaps(faces, params.nms_threshold))
}

/// Decode raw detector heads into faces in canvas pixels.
pub(crate) fn decode(
    heads: &[(Vec<i64>, Vec<f32>)],
    input_size: usize,
    score_threshold: f32,
) -> Result<Vec<Face>> {
    if heads.len() < 4 * STRIDES.len() {
        anyhow::bail!(
            "detector produced {} outputs, expected {}",
            heads.len(),
            4 * STRIDES.len()
        );
    }

    let mut faces = Vec::new();
    for (level, &stride) in STRIDES.iter().enumerate() {
        let cols = input_size / stride;
        let cells = cols * cols;
        let cls = head(heads, level, cells, 1)?;
        let obj = head(heads, level + 3, cells, 1)?;
        let bbox = head(heads, level + 6, cells, 4)?;
        let kps = head(heads, level + 9, cells, 10)?;

        let s = stride as f32;
        for idx in 0..cells {
            let score = (cls[[idx, 0]].clamp(0.0, 1.0) * obj[[idx, 0]].clamp(0.0, 1.0)).sqrt();
            if score < score_threshold {
                continue;
            }
            let row = (idx / cols) as f32;
            let col = (idx % cols) as f32;

            let cx = (col + bbox[[idx, 0]]) * s;
            let cy = (row + bbox[[idx, 1]]) * s;
            let w = bbox[[idx, 2]].exp() * s;
            let h = bbox[[idx, 3]].exp() * s;

            let mut landmarks = [[0.0f32; 2]; 5];
            for (k, point) in landmarks.iter_mut().enumerate() {
                *point = [
                    (col + kps[[idx, 2 * k]]) * s,
                    (row + kps[[idx, 2 * k + 1]]) * s,
                ];
            }

            faces.push(Face {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }
    Ok(faces)
}

fn head(
    heads: &[(Vec<i64>, Vec<f32>)],
    index: usize,
    cells: usize,
    width: usize,
) -> Result<ArrayView2<'_, f32>> {
    let (shape, data) = heads
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing detector output {}", index))?;
    let expected = [1, cells as i64, width as i64];
    if shape.as_slice() != expected {
        anyhow::bail!(
            "detector output {} has shape {:?}, expected {:?}",
            index,
            shape,
            expected
        );
    }
    Ok(ArrayView2::from_shape((cells, width), data.as_slice())?)
}

/// Greedy non-maximum suppression. Returns survivors ordered by score.
pub fn suppress_overlaps(mut faces: Vec<Face>, iou_threshold: f32) -> Vec<Face> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));
    if iou_threshold >= 1.0 {
        return faces;
    }
    let mut kept: Vec<Face> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept.iter().all(|k| iou(&k.bbox, &face.bbox) <= iou_threshold) {
            kept.push(face);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let overlap_w = (a[0] + a[2]).min(b[0] + b[2]) - a[0].max(b[0]);
    let overlap_h = (a[1] + a[3]).min(b[1] + b[3]) - a[1].max(b[1]);
    if overlap_w <= 0.0 || overlap_h <= 0.0 {
        return 0.0;
    }
    let inter = overlap_w * overlap_h;
    let union = a[2] * a[3] + b[2] * b[3] - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(bbox: [f32; 4], score: f32) -> Face {
        Face {
            bbox,
            score,
            landmarks: [[0.0; 2]; 5],
        }
    }

    fn empty_heads(input_size: usize) -> Vec<(Vec<i64>, Vec<f32>)> {
        let widths = [1, 1, 4, 10];
        let mut heads = Vec::new();
        for width in widths {
            for stride in STRIDES {
                let cells = (input_size / stride).pow(2);
                heads.push((
                    vec![1, cells as i64, width as i64],
                    vec![0.0; cells * width],
                ));
            }
        }
        heads
    }

    #[test]
    fn test_iou() {
        let a = [10.0, 10.0, 20.0, 20.0];
        let b = [15.0, 15.0, 20.0, 20.0];
        let v = iou(&a, &b);
        assert!(v > 0.0 && v < 1.0);
        assert_eq!(iou(&a, &[100.0, 100.0, 10.0, 10.0]), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_suppress_overlaps() {
        let faces = vec![
            face([12.0, 12.0, 20.0, 20.0], 0.8),
            face([10.0, 10.0, 20.0, 20.0], 0.9),
            face([100.0, 100.0, 20.0, 20.0], 0.85),
        ];
        let kept = suppress_overlaps(faces, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.85);
    }

    #[test]
    fn test_decode_single_cell() {
        // 64px input: grids of 8x8, 4x4 and 2x2
        let mut heads = empty_heads(64);
        let (row, col) = (1usize, 0usize);
        let idx = row * 2 + col;
        // stride-32 level is index 2 within each head group
        heads[2].1[idx] = 0.81;
        heads[5].1[idx] = 1.0;
        heads[8].1[idx * 4] = 0.5;
        heads[8].1[idx * 4 + 1] = 0.25;
        heads[8].1[idx * 4 + 2] = 0.0;
        heads[8].1[idx * 4 + 3] = 0.0;
        heads[11].1[idx * 10] = 0.5;
        heads[11].1[idx * 10 + 1] = 0.5;

        let faces = decode(&heads, 64, 0.5).unwrap();
        assert_eq!(faces.len(), 1);
        let f = &faces[0];
        assert!((f.score - 0.9).abs() < 1e-5);
        // cx = (0 + 0.5) * 32 = 16, cy = (1 + 0.25) * 32 = 40, w = h = 32
        assert!((f.bbox[0] - 0.0).abs() < 1e-4);
        assert!((f.bbox[1] - 24.0).abs() < 1e-4);
        assert!((f.bbox[2] - 32.0).abs() < 1e-4);
        assert!((f.bbox[3] - 32.0).abs() < 1e-4);
        assert!((f.landmarks[0][0] - 16.0).abs() < 1e-4);
        assert!((f.landmarks[0][1] - 48.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let mut heads = empty_heads(64);
        heads[7].0 = vec![1, 3, 4];
        assert!(decode(&heads, 64, 0.5).is_err());
        assert!(decode(&heads[..5], 64, 0.5).is_err());
    }

    #[test]
    fn test_letterbox_round_trip() {
        let lb = Letterbox::fit(200, 100, 640);
        // 200x100 scales by 3.2 to 640x320, centered vertically
        assert_eq!(lb.offset_x, 0);
        assert_eq!(lb.offset_y, 160);
        let (x, y) = lb.to_source(320.0, 320.0);
        assert!((x - 100.0).abs() < 1e-4);
        assert!((y - 50.0).abs() < 1e-4);

        let restored = lb.restore(face([320.0, 160.0, 64.0, 32.0], 0.9));
        assert!((restored.bbox[0] - 100.0).abs() < 1e-4);
        assert!((restored.bbox[1] - 0.0).abs() < 1e-4);
        assert!((restored.bbox[2] - 20.0).abs() < 1e-4);
        assert!((restored.bbox[3] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_render_size() {
        let img = DynamicImage::new_rgb8(30, 60);
        let lb = Letterbox::fit(30, 60, 64);
        let canvas = lb.render(&img);
        assert_eq!(canvas.dimensions(), (64, 64));
    }
}
