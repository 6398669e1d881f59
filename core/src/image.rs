//! Image metadata reported by `qemu-img info --output=json`.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Virtual image information.
///
/// Field names follow the tool's JSON output contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Format of the image (`raw`, `qcow2`, ...)
    pub format: String,

    /// File name of the backing file, empty when the image stands alone
    #[serde(rename = "backing-filename", default)]
    pub backing_file: String,

    /// Disk size seen by the VM, in bytes
    #[serde(rename = "virtual-size")]
    pub virtual_size: i64,

    /// Space the image occupies on the host, in bytes
    #[serde(rename = "actual-size", default)]
    pub actual_size: i64,
}

impl ImageInfo {
    /// Parse the JSON document printed by the inspect mode.
    pub fn from_json(output: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(output)?)
    }

    pub fn has_backing_file(&self) -> bool {
        !self.backing_file.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const QCOW2_INFO: &str = r#"{
        "virtual-size": 10737418240,
        "filename": "disk.qcow2",
        "cluster-size": 65536,
        "format": "qcow2",
        "actual-size": 200704,
        "format-specific": {"type": "qcow2", "data": {"compat": "1.1"}},
        "dirty-flag": false
    }"#;

    #[test]
    fn test_parse_tool_output() {
        let info = ImageInfo::from_json(QCOW2_INFO.as_bytes()).unwrap();
        assert_eq!(info.format, "qcow2");
        assert_eq!(info.virtual_size, 10737418240);
        assert_eq!(info.actual_size, 200704);
        assert!(!info.has_backing_file());
    }

    #[test]
    fn test_parse_backing_file() {
        let json = r#"{"format":"qcow2","backing-filename":"base.qcow2","virtual-size":1,"actual-size":1}"#;
        let info = ImageInfo::from_json(json.as_bytes()).unwrap();
        assert_eq!(info.backing_file, "base.qcow2");
        assert!(info.has_backing_file());
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = ImageInfo::from_json(br#"{"format": 3}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);

        let err = ImageInfo::from_json(b"qemu-img: Could not open").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_serializes_with_tool_field_names() {
        let info = ImageInfo {
            format: "raw".to_string(),
            backing_file: String::new(),
            virtual_size: 4096,
            actual_size: 0,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["virtual-size"], 4096);
        assert_eq!(json["backing-filename"], "");
    }
}
