//! Resource ceilings applied to image-tool subprocesses.

use serde::{Deserialize, Serialize};

/// Address-space ceiling for inspecting untrusted images (1 GiB, as OpenStack Nova uses).
pub const INFO_ADDRESS_SPACE_LIMIT: u64 = 1 << 30;

/// CPU-time ceiling for inspecting untrusted images, in seconds.
pub const INFO_CPU_TIME_LIMIT_SECS: u64 = 30;

/// Largest value accepted for either limit; anything above reaches the
/// platform's `RLIM_INFINITY` encoding.
pub const MAX_LIMIT_VALUE: u64 = i64::MAX as u64;

/// Hard limits applied to a subprocess before it runs any of its own code.
///
/// A zero value leaves that dimension unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessLimits {
    /// Maximum virtual address space in bytes (`RLIMIT_AS`)
    #[serde(default)]
    pub address_space_bytes: u64,

    /// Maximum CPU time in seconds (`RLIMIT_CPU`)
    #[serde(default)]
    pub cpu_time_secs: u64,
}

impl ProcessLimits {
    /// Policy used for `qemu-img info`.
    pub const fn info() -> Self {
        Self {
            address_space_bytes: INFO_ADDRESS_SPACE_LIMIT,
            cpu_time_secs: INFO_CPU_TIME_LIMIT_SECS,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.address_space_bytes == 0 && self.cpu_time_secs == 0
    }

    /// Whether both values fit below [`MAX_LIMIT_VALUE`].
    pub fn is_representable(&self) -> bool {
        self.address_space_bytes <= MAX_LIMIT_VALUE && self.cpu_time_secs <= MAX_LIMIT_VALUE
    }
}
