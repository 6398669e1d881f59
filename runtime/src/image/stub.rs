//! Canned [`ImageOperations`] for tests.

use super::ImageOperations;
use diskimg_core::error::{ImageError, Result};
use diskimg_core::{ImageInfo, Quantity};
use parking_lot::Mutex;
use std::path::Path;
use url::Url;

/// Returns a fixed [`ImageInfo`] and optionally fails every mutating call.
///
/// Every call is recorded as `"<operation> <args>"` so tests can assert on
/// what the code under test asked for.
#[derive(Debug, Default)]
pub struct StubOperations {
    info: Option<ImageInfo>,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `info` with `info`.
    pub fn with_info(mut self, info: ImageInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Fail convert, resize and create calls with `message` as tool output.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().push(call);
        match &self.failure {
            Some(message) => Err(ImageError::SubprocessFailed {
                binary: "stub".to_string(),
                status: "exit status 1".to_string(),
                output: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ImageOperations for StubOperations {
    fn convert_qcow2_to_raw(&self, src: &Path, dest: &Path) -> Result<()> {
        self.record(format!("convert {} {}", src.display(), dest.display()))
    }

    fn convert_qcow2_to_raw_stream(&self, url: &Url, dest: &Path) -> Result<()> {
        self.record(format!("convert-stream {} {}", url, dest.display()))
    }

    fn resize(&self, image: &Path, size: &Quantity) -> Result<()> {
        self.record(format!("resize {} {}", image.display(), size))
    }

    fn info(&self, image: &Path) -> Result<ImageInfo> {
        self.calls.lock().push(format!("info {}", image.display()));
        self.info.clone().ok_or_else(|| {
            ImageError::Parse(format!("no image info stubbed for {}", image.display()))
        })
    }

    fn create_blank_image(&self, dest: &Path, size: &Quantity) -> Result<()> {
        self.record(format!("create {} {}", dest.display(), size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskimg_core::error::{ErrorKind, ValidationFailure};

    fn qcow2(virtual_size: i64) -> ImageInfo {
        ImageInfo {
            format: "qcow2".to_string(),
            backing_file: String::new(),
            virtual_size,
            actual_size: 1024,
        }
    }

    #[test]
    fn test_validate_through_trait_default() {
        let ops = StubOperations::new().with_info(qcow2(2048));
        assert!(ops.validate(Path::new("/data/disk.qcow2"), "qcow2", 4096).is_ok());

        let err = ops
            .validate(Path::new("/data/disk.qcow2"), "qcow2", 1024)
            .unwrap_err();
        assert!(matches!(
            err,
            ImageError::Validation(ValidationFailure::SizeExceeded { .. })
        ));
        assert_eq!(ops.calls(), vec!["info /data/disk.qcow2", "info /data/disk.qcow2"]);
    }

    #[test]
    fn test_info_without_stub_is_parse_failure() {
        let ops = StubOperations::new();
        let err = ops.info(Path::new("/data/disk.qcow2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_failing_records_and_fails() {
        let ops = StubOperations::new().failing("disk full");
        let size: Quantity = "1Gi".parse().unwrap();
        let err = ops
            .create_blank_image(Path::new("/data/disk.img"), &size)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubprocessFailed);
        assert_eq!(err.output(), Some("disk full"));
        assert_eq!(ops.calls(), vec!["create /data/disk.img 1Gi"]);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let ops: Box<dyn ImageOperations> = Box::new(StubOperations::new());
        let url = Url::parse("https://example.com/disk.qcow2").unwrap();
        assert!(ops
            .convert_qcow2_to_raw_stream(&url, Path::new("/data/disk.img"))
            .is_ok());
    }
}
