//! `qemu-img` backed image operations.

use super::ImageOperations;
use crate::exec::execute_with_limits;
use crate::progress::{ProgressReporter, ProgressState};
use diskimg_core::error::Result;
use diskimg_core::quantity::to_tool_size;
use diskimg_core::{EngineConfig, ImageInfo, Quantity};
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Production [`ImageOperations`] running the configured `qemu-img` binary.
pub struct QemuOperations {
    config: EngineConfig,
    progress: Arc<ProgressState>,
}

impl QemuOperations {
    pub fn new(config: EngineConfig, progress: Arc<ProgressState>) -> Self {
        Self { config, progress }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn progress(&self) -> &Arc<ProgressState> {
        &self.progress
    }

    /// `json:` pseudo-filename describing a network-backed source for the curl driver.
    fn stream_source(&self, url: &Url) -> String {
        format!(
            "json: {{\"file.driver\": {}, \"file.url\": {}, \"file.timeout\": {}}}",
            serde_json::Value::from(url.scheme()),
            serde_json::Value::from(url.as_str()),
            self.config.network_timeout_secs
        )
    }

    fn convert_to_raw(
        &self,
        source: OsString,
        dest: &Path,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<()> {
        let args: Vec<OsString> = vec![
            "convert".into(),
            "-p".into(),
            "-f".into(),
            "qcow2".into(),
            "-O".into(),
            "raw".into(),
            source,
            dest.into(),
        ];
        execute_with_limits(None, Some(on_line), &self.config.qemu_img, &args)?;
        Ok(())
    }
}

impl ImageOperations for QemuOperations {
    fn convert_qcow2_to_raw(&self, src: &Path, dest: &Path) -> Result<()> {
        tracing::info!(src = %src.display(), dest = %dest.display(), "Converting qcow2 image to raw");
        let mut on_line = |line: &str| tracing::trace!(line, "qemu-img convert");
        self.convert_to_raw(src.into(), dest, &mut on_line)
            .map_err(|e| {
                remove_partial(dest);
                e.context("could not convert local qcow2 image to raw")
            })
    }

    fn convert_qcow2_to_raw_stream(&self, url: &Url, dest: &Path) -> Result<()> {
        tracing::info!(url = %url, dest = %dest.display(), "Streaming qcow2 image to raw");
        let reporter = ProgressReporter::new(self.progress.clone(), self.config.owner_uid.clone());
        let mut on_line = |line: &str| reporter.on_line(line);
        self.convert_to_raw(self.stream_source(url).into(), dest, &mut on_line)
            .map_err(|e| {
                remove_partial(dest);
                e.context("could not stream/convert qcow2 image to raw")
            })
    }

    fn resize(&self, image: &Path, size: &Quantity) -> Result<()> {
        let tool_size = to_tool_size(size);
        tracing::info!(image = %image.display(), size = %tool_size, "Resizing raw image");
        let args: Vec<OsString> = vec![
            "resize".into(),
            "-f".into(),
            "raw".into(),
            image.into(),
            tool_size.into(),
        ];
        execute_with_limits(None, None, &self.config.qemu_img, &args)
            .map_err(|e| e.context(format!("error resizing image {}", image.display())))?;
        Ok(())
    }

    fn info(&self, image: &Path) -> Result<ImageInfo> {
        let args: Vec<OsString> = vec!["info".into(), "--output=json".into(), image.into()];
        let output = execute_with_limits(
            Some(&self.config.info_limits),
            None,
            &self.config.qemu_img,
            &args,
        )
        .map_err(|e| e.context(format!("could not inspect image {}", image.display())))?;

        let info = ImageInfo::from_json(&output)
            .map_err(|e| e.context(format!("could not parse info for image {}", image.display())))?;
        tracing::debug!(
            image = %image.display(),
            format = %info.format,
            virtual_size = info.virtual_size,
            "Inspected image"
        );
        Ok(info)
    }

    fn create_blank_image(&self, dest: &Path, size: &Quantity) -> Result<()> {
        let tool_size = to_tool_size(size);
        tracing::info!(dest = %dest.display(), size = %size, "Creating blank raw image");
        let args: Vec<OsString> = vec![
            "create".into(),
            "-f".into(),
            "raw".into(),
            dest.into(),
            tool_size.into(),
        ];
        execute_with_limits(None, None, &self.config.qemu_img, &args).map_err(|e| {
            remove_partial(dest);
            e.context(format!(
                "could not create raw image with size {} in {}",
                size,
                dest.display()
            ))
        })?;
        Ok(())
    }
}

/// Best-effort removal of a partially written destination.
fn remove_partial(dest: &Path) {
    match std::fs::remove_file(dest) {
        Ok(()) => tracing::debug!(dest = %dest.display(), "Removed partial image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            dest = %dest.display(),
            error = %e,
            "Failed to remove partial image"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskimg_core::error::ImageError;

    fn ops(config: EngineConfig) -> QemuOperations {
        QemuOperations::new(config, Arc::new(ProgressState::new().unwrap()))
    }

    #[test]
    fn test_stream_source_argument() {
        let ops = ops(EngineConfig::default());
        let url = Url::parse("https://images.example.com/fedora.qcow2").unwrap();
        assert_eq!(
            ops.stream_source(&url),
            r#"json: {"file.driver": "https", "file.url": "https://images.example.com/fedora.qcow2", "file.timeout": 3600}"#
        );
    }

    #[test]
    fn test_stream_source_uses_configured_timeout() {
        let ops = ops(EngineConfig {
            network_timeout_secs: 600,
            ..EngineConfig::default()
        });
        let url = Url::parse("http://10.0.0.1/disk.qcow2").unwrap();
        assert!(ops.stream_source(&url).ends_with(r#""file.timeout": 600}"#));
        assert!(ops.stream_source(&url).contains(r#""file.driver": "http""#));
    }

    #[test]
    fn test_remove_partial_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial(&dir.path().join("never-written.img"));
    }

    #[test]
    fn test_remove_partial_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("partial.img");
        std::fs::write(&dest, b"partial").unwrap();
        remove_partial(&dest);
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_binary_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops(EngineConfig {
            qemu_img: "/nonexistent/qemu-img".into(),
            ..EngineConfig::default()
        });
        let err = ops.info(&dir.path().join("disk.img")).unwrap_err();
        assert!(err.to_string().starts_with("could not inspect image"));
        assert!(matches!(err.root(), ImageError::Spawn { .. }));
    }
}
