use serde::{Deserialize, Serialize};

use crate::probe::probe;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Acceptance rules for farm and identity photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRules {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
    #[serde(default = "default_min_aspect")]
    pub min_aspect_ratio: f64,
    #[serde(default = "default_max_aspect")]
    pub max_aspect_ratio: f64,
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_mime_types() -> Vec<String> {
    ["image/jpeg", "image/jpg", "image/png", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_width() -> u32 {
    1280
}

fn default_min_height() -> u32 {
    720
}

fn default_min_aspect() -> f64 {
    0.5
}

fn default_max_aspect() -> f64 {
    2.0
}

impl Default for PhotoRules {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_mime_types: default_mime_types(),
            min_width: default_min_width(),
            min_height: default_min_height(),
            min_aspect_ratio: default_min_aspect(),
            max_aspect_ratio: default_max_aspect(),
        }
    }
}

/// What is known about a photo before it is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl PhotoDescriptor {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            width: Some(width),
            height: Some(height),
        }
    }

    /// Describe an uploaded file from its bytes. The sniffed format wins over
    /// the declared type; unrecognised content keeps the declared type (or
    /// `application/octet-stream`) and has no dimensions.
    pub fn from_bytes(
        file_name: impl Into<String>,
        declared_mime: Option<&str>,
        bytes: &[u8],
    ) -> Self {
        let size_bytes = bytes.len() as u64;
        match probe(bytes) {
            Some(info) => Self {
                file_name: file_name.into(),
                mime_type: info.format.mime_type().to_string(),
                size_bytes,
                width: Some(info.width),
                height: Some(info.height),
            },
            None => Self {
                file_name: file_name.into(),
                mime_type: declared_mime
                    .filter(|m| !m.starts_with("image/"))
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                size_bytes,
                width: None,
                height: None,
            },
        }
    }
}

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PhotoViolation {
    TooLarge { size_bytes: u64, max_bytes: u64 },
    UnsupportedType { mime_type: String },
    ResolutionTooLow { width: u32, height: u32, min_width: u32, min_height: u32 },
    AspectRatioOutOfRange { ratio: f64, min: f64, max: f64 },
    UnreadableImage,
}

impl std::fmt::Display for PhotoViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoViolation::TooLarge { max_bytes, .. } => {
                write!(f, "Photo size must be under {}MB", max_bytes / (1024 * 1024))
            }
            PhotoViolation::UnsupportedType { mime_type } => {
                write!(f, "Photo must be JPEG, PNG, or WebP (got {mime_type})")
            }
            PhotoViolation::ResolutionTooLow {
                min_width,
                min_height,
                ..
            } => write!(f, "Resolution must be at least {min_width}x{min_height}"),
            PhotoViolation::AspectRatioOutOfRange { min, max, .. } => {
                write!(f, "Aspect ratio must be between {min} and {max}")
            }
            PhotoViolation::UnreadableImage => f.write_str("Image dimensions could not be read"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub violations: Vec<PhotoViolation>,
}

impl PhotoRules {
    /// Check every rule and collect all violations.
    pub fn validate(&self, photo: &PhotoDescriptor) -> PhotoValidation {
        let mut violations = Vec::new();

        if photo.size_bytes > self.max_bytes {
            violations.push(PhotoViolation::TooLarge {
                size_bytes: photo.size_bytes,
                max_bytes: self.max_bytes,
            });
        }

        let mime = photo.mime_type.to_ascii_lowercase();
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            violations.push(PhotoViolation::UnsupportedType {
                mime_type: photo.mime_type.clone(),
            });
        }

        match (photo.width, photo.height) {
            (Some(width), Some(height)) => {
                if width < self.min_width || height < self.min_height {
                    violations.push(PhotoViolation::ResolutionTooLow {
                        width,
                        height,
                        min_width: self.min_width,
                        min_height: self.min_height,
                    });
                }
                let ratio = if height == 0 {
                    f64::INFINITY
                } else {
                    f64::from(width) / f64::from(height)
                };
                if !(self.min_aspect_ratio..=self.max_aspect_ratio).contains(&ratio) {
                    violations.push(PhotoViolation::AspectRatioOutOfRange {
                        ratio,
                        min: self.min_aspect_ratio,
                        max: self.max_aspect_ratio,
                    });
                }
            }
            _ => violations.push(PhotoViolation::UnreadableImage),
        }

        PhotoValidation {
            is_valid: violations.is_empty(),
            errors: violations.iter().map(ToString::to_string).collect(),
            violations,
        }
    }
}

/// Validate with the default rules.
pub fn validate(photo: &PhotoDescriptor) -> PhotoValidation {
    PhotoRules::default().validate(photo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fixtures;
    use proptest::prelude::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_full_hd_jpeg_passes() {
        let photo = PhotoDescriptor::new("farm.jpg", "image/jpeg", 3 * MB, 1920, 1080);
        let result = validate(&photo);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_low_resolution_fails() {
        let photo = PhotoDescriptor::new("old.jpg", "image/jpeg", MB, 640, 480);
        let result = validate(&photo);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Resolution must be at least 1280x720"]);
    }

    #[test]
    fn test_oversized_png_fails_on_size() {
        let photo = PhotoDescriptor::new("big.png", "image/png", 11 * MB, 4000, 3000);
        let result = validate(&photo);
        assert!(!result.is_valid);
        assert!(matches!(
            result.violations.as_slice(),
            [PhotoViolation::TooLarge { .. }]
        ));
        assert_eq!(result.errors, vec!["Photo size must be under 10MB"]);
    }

    #[test]
    fn test_non_image_fails_on_type() {
        let photo = PhotoDescriptor::new("notes.pdf", "application/pdf", MB, 1920, 1080);
        let result = validate(&photo);
        assert!(!result.is_valid);
        assert!(matches!(
            result.violations.as_slice(),
            [PhotoViolation::UnsupportedType { .. }]
        ));
    }

    #[test]
    fn test_multiple_violations_are_all_reported() {
        let photo = PhotoDescriptor::new("strip.gif", "image/gif", 12 * MB, 3000, 100);
        let result = validate(&photo);
        assert_eq!(result.errors.len(), 4);
        assert!(matches!(
            result.violations.as_slice(),
            [
                PhotoViolation::TooLarge { .. },
                PhotoViolation::UnsupportedType { .. },
                PhotoViolation::ResolutionTooLow { .. },
                PhotoViolation::AspectRatioOutOfRange { .. },
            ]
        ));
    }

    #[test]
    fn test_aspect_ratio_bounds_are_inclusive() {
        let wide = PhotoDescriptor::new("w.png", "image/png", MB, 2880, 1440);
        let tall = PhotoDescriptor::new("t.png", "image/png", MB, 1440, 2880);
        assert!(validate(&wide).is_valid);
        assert!(validate(&tall).is_valid);
    }

    #[test]
    fn test_from_bytes_sniffs_real_format() {
        let bytes = fixtures::png(1920, 1080);
        let photo = PhotoDescriptor::from_bytes("x.bin", Some("application/octet-stream"), &bytes);
        assert_eq!(photo.mime_type, "image/png");
        assert_eq!(photo.width, Some(1920));
        assert!(validate(&photo).is_valid);
    }

    #[test]
    fn test_from_bytes_unknown_content() {
        let photo = PhotoDescriptor::from_bytes("doc.pdf", Some("application/pdf"), b"%PDF-1.7");
        assert_eq!(photo.mime_type, "application/pdf");
        let result = validate(&photo);
        assert!(result.violations.contains(&PhotoViolation::UnreadableImage));
        assert_eq!(result.violations.len(), 2);
        assert!(result.errors.contains(&"Image dimensions could not be read".to_string()));
        assert!(matches!(
            result.violations[0],
            PhotoViolation::UnsupportedType { .. }
        ));
    }

    #[test]
    fn test_from_bytes_claims_image_but_is_not() {
        let photo = PhotoDescriptor::from_bytes("fake.jpg", Some("image/jpeg"), b"not an image");
        assert_eq!(photo.mime_type, "application/octet-stream");
        assert!(!validate(&photo).is_valid);
    }

    proptest! {
        #[test]
        fn prop_valid_iff_no_errors(
            size in 0u64..(20 * MB),
            width in 0u32..5000,
            height in 0u32..5000,
            mime_idx in 0usize..5,
        ) {
            let mime = ["image/jpeg", "image/png", "image/webp", "image/gif", "text/plain"][mime_idx];
            let photo = PhotoDescriptor::new("p", mime, size, width, height);
            let result = validate(&photo);
            prop_assert_eq!(result.is_valid, result.errors.is_empty());
            prop_assert_eq!(result.errors.len(), result.violations.len());
            prop_assert_eq!(
                size > DEFAULT_MAX_BYTES,
                result.violations.iter().any(|v| matches!(v, PhotoViolation::TooLarge { .. }))
            );
            prop_assert_eq!(
                width < 1280 || height < 720,
                result.violations.iter().any(|v| matches!(v, PhotoViolation::ResolutionTooLow { .. }))
            );
        }
    }
}
