use std::path::Path;

/// Maximum accepted upload size. Part of the public contract.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Media types the inference pipeline accepts. Part of the public contract.
pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/dicom"];

/// An upload as handed to us by the caller, before any policy check.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub path: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
}

impl UploadCandidate {
    /// Build a candidate from a file on disk, inferring the media type
    /// from the extension when the caller does not supply one.
    pub fn from_path(path: &str, media_type: Option<String>) -> anyhow::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(UploadCandidate {
            path: path.to_string(),
            media_type: media_type.or_else(|| media_type_for_path(path).map(String::from)),
            size_bytes: metadata.len(),
        })
    }
}

/// An upload that passed the intake policy and may be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub path: String,
    pub media_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file is {size_bytes} bytes, which exceeds the 10 MiB upload limit")]
    SizeExceeded { size_bytes: u64 },
    #[error("unsupported file type {0:?}: only JPEG, PNG, and DICOM files are accepted")]
    UnsupportedType(String),
}

/// Check a candidate against the upload policy. Pure: no I/O, no state.
/// Rules apply in order and the first failure wins, so an oversized file
/// is rejected as oversized even when its type is also wrong.
pub fn validate(candidate: UploadCandidate) -> Result<ValidatedFile, ValidationError> {
    if candidate.size_bytes > MAX_UPLOAD_BYTES {
        return Err(ValidationError::SizeExceeded {
            size_bytes: candidate.size_bytes,
        });
    }

    let media_type = candidate.media_type.unwrap_or_default();
    if !SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Err(ValidationError::UnsupportedType(media_type));
    }

    Ok(ValidatedFile {
        path: candidate.path,
        media_type,
        size_bytes: candidate.size_bytes,
    })
}

/// Map a filename extension to its upload media type.
pub fn media_type_for_path(path: &str) -> Option<&'static str> {
    let extension = Path::new(path).extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "dcm" => Some("application/dicom"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(media_type: &str, size_bytes: u64) -> UploadCandidate {
        UploadCandidate {
            path: "uploads/scan.jpg".to_string(),
            media_type: Some(media_type.to_string()),
            size_bytes,
        }
    }

    #[test]
    fn test_accepts_small_jpeg() {
        let validated = validate(candidate("image/jpeg", 2 * 1024 * 1024)).unwrap();
        assert_eq!(validated.media_type, "image/jpeg");
        assert_eq!(validated.size_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_accepts_every_supported_type_at_limit() {
        for media_type in SUPPORTED_MEDIA_TYPES {
            assert!(validate(candidate(media_type, MAX_UPLOAD_BYTES)).is_ok());
        }
    }

    #[test]
    fn test_rejects_oversized_png() {
        let result = validate(candidate("image/png", 12 * 1024 * 1024));
        assert_eq!(
            result,
            Err(ValidationError::SizeExceeded {
                size_bytes: 12 * 1024 * 1024
            })
        );
    }

    #[test]
    fn test_size_check_wins_over_type_check() {
        // Oversized file with an unsupported type still reports SizeExceeded.
        let result = validate(candidate("image/gif", MAX_UPLOAD_BYTES + 1));
        assert!(matches!(result, Err(ValidationError::SizeExceeded { .. })));
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let result = validate(candidate("image/gif", 1024));
        assert_eq!(
            result,
            Err(ValidationError::UnsupportedType("image/gif".to_string()))
        );
    }

    #[test]
    fn test_rejects_missing_type() {
        let mut unknown = candidate("image/jpeg", 1024);
        unknown.media_type = None;
        assert!(matches!(
            validate(unknown),
            Err(ValidationError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path("scan.jpg"), Some("image/jpeg"));
        assert_eq!(media_type_for_path("scan.JPEG"), Some("image/jpeg"));
        assert_eq!(media_type_for_path("scan.png"), Some("image/png"));
        assert_eq!(media_type_for_path("scan.dcm"), Some("application/dicom"));
        assert_eq!(media_type_for_path("scan.gif"), None);
        assert_eq!(media_type_for_path("scan"), None);
    }
}
