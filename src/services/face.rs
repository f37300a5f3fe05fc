//! Face enrollment and matching.
//!
//! Images arrive as `data:image/...;base64,` URLs. An [`FaceEncoder`] turns
//! the decoded bytes into a 128-dimension vector in `[0, 1]`; matching uses
//! the euclidean distance normalized by `sqrt(128)`, so distances also fall in
//! `[0, 1]` and `confidence = 1 - distance`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const ENCODING_DIMENSIONS: usize = 128;
/// Enrollment keeps at most this many encodings per user, newest last.
pub const MAX_ENCODINGS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FaceError {
    #[error("No image provided")]
    MissingImage,
    #[error("Invalid image format. Expected base64 data URL")]
    InvalidFormat,
    #[error("No face detected in image")]
    NoFaceDetected,
}

impl FaceError {
    pub fn code(&self) -> &'static str {
        match self {
            FaceError::MissingImage => "MISSING_IMAGE",
            FaceError::InvalidFormat => "INVALID_IMAGE_FORMAT",
            FaceError::NoFaceDetected => "NO_FACE_DETECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(ImageFormat::Png),
            [b'G', b'I', b'F', b'8', ..] => Some(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Some(ImageFormat::Webp)
            }
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Parses a base64 image data URL and checks the payload's magic bytes.
pub fn decode_data_url(data_url: &str) -> Result<DecodedImage, FaceError> {
    let data_url = data_url.trim();
    if data_url.is_empty() {
        return Err(FaceError::MissingImage);
    }
    if !data_url.starts_with("data:image/") {
        return Err(FaceError::InvalidFormat);
    }
    let (_, payload) = data_url
        .split_once(";base64,")
        .ok_or(FaceError::InvalidFormat)?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| FaceError::InvalidFormat)?;
    let format = ImageFormat::sniff(&bytes).ok_or(FaceError::InvalidFormat)?;
    Ok(DecodedImage { format, bytes })
}

pub trait FaceEncoder: Send + Sync {
    /// Returns `NoFaceDetected` when the image carries no usable signal.
    fn encode(&self, image: &DecodedImage) -> Result<Vec<f64>, FaceError>;
}

/// Deterministic encoder over the byte profile of the image payload.
///
/// Splits the payload into 128 contiguous buckets and records each bucket's
/// mean intensity. Flat or tiny payloads are rejected.
#[derive(Debug, Clone, Default)]
pub struct ByteProfileEncoder;

impl FaceEncoder for ByteProfileEncoder {
    fn encode(&self, image: &DecodedImage) -> Result<Vec<f64>, FaceError> {
        let bytes = &image.bytes;
        if bytes.len() < ENCODING_DIMENSIONS * 2 {
            return Err(FaceError::NoFaceDetected);
        }
        let chunk = bytes.len() / ENCODING_DIMENSIONS;
        let encoding: Vec<f64> = bytes
            .chunks(chunk)
            .take(ENCODING_DIMENSIONS)
            .map(|c| c.iter().map(|&b| f64::from(b)).sum::<f64>() / (c.len() as f64 * 255.0))
            .collect();

        let mean = encoding.iter().sum::<f64>() / encoding.len() as f64;
        let variance =
            encoding.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / encoding.len() as f64;
        if variance < 1e-6 {
            return Err(FaceError::NoFaceDetected);
        }
        Ok(encoding)
    }
}

/// Normalized euclidean distance between two encodings.
pub fn face_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (sum / a.len() as f64).sqrt().min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    pub distance: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    NotRecognized,
    LowConfidence(FaceMatch),
    Matched(FaceMatch),
}

pub struct FaceService {
    encoder: Box<dyn FaceEncoder>,
    tolerance: f64,
}

impl FaceService {
    pub fn new(tolerance: f64) -> Self {
        Self::with_encoder(Box::new(ByteProfileEncoder), tolerance)
    }

    pub fn with_encoder(encoder: Box<dyn FaceEncoder>, tolerance: f64) -> Self {
        Self { encoder, tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn encode(&self, image: &DecodedImage) -> Result<Vec<f64>, FaceError> {
        self.encoder.encode(image)
    }

    /// Appends an encoding, keeping the newest `MAX_ENCODINGS`.
    pub fn enroll(&self, mut known: Vec<Vec<f64>>, encoding: Vec<f64>) -> Vec<Vec<f64>> {
        known.push(encoding);
        if known.len() > MAX_ENCODINGS {
            let excess = known.len() - MAX_ENCODINGS;
            known.drain(..excess);
        }
        known
    }

    /// A capture matches when its nearest known encoding is within tolerance;
    /// the match is then rejected as low confidence when
    /// `1 - distance < tolerance`.
    pub fn compare(&self, known: &[Vec<f64>], capture: &[f64]) -> MatchOutcome {
        let Some(distance) = known
            .iter()
            .map(|k| face_distance(k, capture))
            .min_by(|a, b| a.total_cmp(b))
        else {
            return MatchOutcome::NotRecognized;
        };
        if distance > self.tolerance {
            return MatchOutcome::NotRecognized;
        }
        let found = FaceMatch {
            distance,
            confidence: 1.0 - distance,
        };
        if found.confidence < self.tolerance {
            MatchOutcome::LowConfidence(found)
        } else {
            MatchOutcome::Matched(found)
        }
    }

    /// Writes the captured photo under `dir`. Failures are logged, not fatal.
    ///
    /// Names carry a random suffix so two captures in the same second never
    /// share a file.
    pub async fn store_capture(
        dir: &Path,
        user_id: i64,
        class_id: i64,
        image: &DecodedImage,
        at: DateTime<Utc>,
    ) -> Option<PathBuf> {
        let suffix = Uuid::new_v4().simple().to_string();
        let path = dir.join(format!(
            "attendance_{}_{}_{}_{}.{}",
            user_id,
            class_id,
            at.format("%Y%m%d_%H%M%S"),
            &suffix[..8],
            image.format.extension()
        ));
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!("Photo save error: {}", e);
            return None;
        }
        match tokio::fs::write(&path, &image.bytes).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::error!("Photo save error: {}", e);
                None
            }
        }
    }

    /// Removes a capture whose attendance row was never written.
    pub async fn discard_capture(path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Discarded capture {}", path.display()),
            Err(e) => tracing::warn!("Failed to discard capture {}: {}", path.display(), e),
        }
    }
}
