//! Disk image operations.
//!
//! [`ImageOperations`] is the operation set callers program against.
//! [`QemuOperations`] drives `qemu-img`; [`StubOperations`] returns canned
//! results for tests of code that consumes the trait.

mod qemu;
mod stub;

pub use qemu::QemuOperations;
pub use stub::StubOperations;

use diskimg_core::error::{Result, ValidationFailure};
use diskimg_core::{ImageInfo, Quantity};
use std::path::Path;
use url::Url;

/// Operations on virtual disk images.
pub trait ImageOperations: Send + Sync {
    /// Convert a local qcow2 image to a raw image at `dest`.
    fn convert_qcow2_to_raw(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Convert a remote qcow2 image to raw without staging it locally.
    fn convert_qcow2_to_raw_stream(&self, url: &Url, dest: &Path) -> Result<()>;

    /// Resize a raw image in place.
    fn resize(&self, image: &Path, size: &Quantity) -> Result<()>;

    /// Inspect an image.
    fn info(&self, image: &Path) -> Result<ImageInfo>;

    /// Check that an image is a standalone `format` image fitting in `available_size` bytes.
    fn validate(&self, image: &Path, format: &str, available_size: i64) -> Result<()> {
        let info = self.info(image)?;
        check_image(&info, format, available_size)
    }

    /// Create an empty raw image of `size` at `dest`.
    fn create_blank_image(&self, dest: &Path, size: &Quantity) -> Result<()>;
}

/// Apply the import rules to inspected image metadata, reporting the first violation.
pub fn check_image(info: &ImageInfo, format: &str, available_size: i64) -> Result<()> {
    if info.format != format {
        return Err(ValidationFailure::FormatMismatch {
            expected: format.to_string(),
            actual: info.format.clone(),
        }
        .into());
    }
    if info.virtual_size > available_size {
        return Err(ValidationFailure::SizeExceeded {
            virtual_size: info.virtual_size,
            available: available_size,
        }
        .into());
    }
    if info.has_backing_file() {
        return Err(ValidationFailure::BackingFile(info.backing_file.clone()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskimg_core::error::{ErrorKind, ImageError};

    fn info(format: &str, virtual_size: i64, backing: &str) -> ImageInfo {
        ImageInfo {
            format: format.to_string(),
            backing_file: backing.to_string(),
            virtual_size,
            actual_size: 4096,
        }
    }

    fn failure(err: ImageError) -> ValidationFailure {
        match err {
            ImageError::Validation(f) => f,
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn test_check_image_accepts_valid() {
        assert!(check_image(&info("qcow2", 1024, ""), "qcow2", 1024).is_ok());
    }

    #[test]
    fn test_check_image_format_mismatch() {
        let err = check_image(&info("vmdk", 1024, ""), "qcow2", 2048).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(matches!(failure(err), ValidationFailure::FormatMismatch { .. }));
    }

    #[test]
    fn test_check_image_too_large() {
        let err = check_image(&info("qcow2", 4097, ""), "qcow2", 4096).unwrap_err();
        assert_eq!(
            failure(err),
            ValidationFailure::SizeExceeded {
                virtual_size: 4097,
                available: 4096
            }
        );
    }

    #[test]
    fn test_check_image_backing_file() {
        let err = check_image(&info("qcow2", 1, "base.qcow2"), "qcow2", 4096).unwrap_err();
        assert_eq!(
            failure(err),
            ValidationFailure::BackingFile("base.qcow2".to_string())
        );
    }

    #[test]
    fn test_check_image_reports_first_violation() {
        let err = check_image(&info("raw", 1 << 40, "base"), "qcow2", 1).unwrap_err();
        assert!(matches!(failure(err), ValidationFailure::FormatMismatch { .. }));
    }
}
