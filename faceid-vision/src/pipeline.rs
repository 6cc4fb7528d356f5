use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::{session::Session, value::Value};
use parking_lot::Mutex;

use crate::align::align_face;
use crate::detect::{self, DetectorParams, Face};
use crate::model::{self, ModelPaths};
use crate::tensor::bgr_planar;
use crate::{ExtractionError, SignatureExtractor, SignatureVector};

const CROP_SIZE: u32 = 112;

/// Full pipeline: detect faces → align → encode, backed by ONNX Runtime.
pub struct OnnxExtractor {
    detector: Mutex<Session>,
    encoder: Mutex<Session>,
    params: DetectorParams,
}

impl OnnxExtractor {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path, params: DetectorParams) -> Result<Self, ExtractionError> {
        let paths = ModelPaths::in_dir(model_dir);
        let missing = paths.missing();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(ExtractionError::ModelLoad(format!(
                "missing model files: {}",
                names.join(", ")
            )));
        }
        let detector = model::detector_session(&paths).map_err(model_load)?;
        let encoder = model::recog_session(&paths).map_err(model_load)?;
        log::info!("loaded face models from {}", model_dir.display());
        Ok(Self {
            detector: Mutex::new(detector),
            encoder: Mutex::new(encoder),
            params,
        })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// All faces in `img`, best first.
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<Face>> {
        let mut session = self.detector.lock();
        detect::detect_faces(&mut session, img, &self.params)
    }

    /// Detect the best face and return it with its signature.
    pub fn process_image(&self, img: &DynamicImage) -> Result<Option<(Face, SignatureVector)>> {
        let faces = self.detect(img).context("detecting faces")?;
        let Some(best) = faces.into_iter().next() else {
            return Ok(None);
        };
        let crop = align_face(img, &best, CROP_SIZE);
        let signature = self.encode(&crop).context("encoding face")?;
        Ok(Some((best, signature)))
    }

    fn encode(&self, crop: &DynamicImage) -> Result<SignatureVector> {
        let input = Value::from_array(bgr_planar(&crop.to_rgb8()))?;
        let mut session = self.encoder.lock();
        let outputs = session.run(ort::inputs![input])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        // SFace emits [1, 128]
        let dim = match shape.len() {
            2 => shape[1] as usize,
            _ => data.len(),
        };
        if dim == 0 || dim > data.len() {
            anyhow::bail!("unexpected encoder output shape {:?}", shape);
        }
        Ok(SignatureVector::from(&data[..dim]).l2_normalized())
    }
}

impl SignatureExtractor for OnnxExtractor {
    fn extract_signature(&self, image: &DynamicImage) -> Result<SignatureVector, ExtractionError> {
        match self.process_image(image) {
            Ok(Some((face, signature))) => {
                log::debug!("face at {:?} score {:.3}", face.bbox, face.score);
                Ok(signature)
            }
            Ok(None) => Err(ExtractionError::NoFaceDetected),
            Err(e) => Err(ExtractionError::Inference(format!("{:#}", e))),
        }
    }
}

fn model_load(err: anyhow::Error) -> ExtractionError {
    ExtractionError::ModelLoad(format!("{:#}", err))
}
