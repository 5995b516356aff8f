//! Filesystem capacity sampling.

use std::path::Path;

use du_exporter_core::{DiskSample, ScanError};

/// Samples block statistics for the filesystem holding a path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSampler;

impl DiskSampler {
    /// Create a new sampler.
    pub fn new() -> Self {
        Self
    }

    /// Query the filesystem holding `path`.
    ///
    /// Free space counts only blocks available to unprivileged users.
    #[cfg(unix)]
    pub fn sample(&self, path: &Path) -> Result<DiskSample, ScanError> {
        let stat = nix::sys::statvfs::statvfs(path)
            .map_err(|errno| ScanError::io(path, std::io::Error::from(errno)))?;

        let block_size = if stat.fragment_size() > 0 {
            stat.fragment_size() as u64
        } else {
            stat.block_size() as u64
        };

        sample_from_blocks(
            path,
            stat.blocks() as u64,
            block_size,
            stat.blocks_available() as u64,
        )
    }

    #[cfg(not(unix))]
    pub fn sample(&self, path: &Path) -> Result<DiskSample, ScanError> {
        Err(ScanError::Unsupported {
            message: format!("filesystem statistics for {}", path.display()),
        })
    }
}

/// Derive capacity figures from raw block counts.
///
/// Fails with [`ScanError::ZeroCapacity`] when the filesystem reports no
/// blocks, since the free percentage would be undefined.
pub fn sample_from_blocks(
    path: &Path,
    blocks: u64,
    block_size: u64,
    available_blocks: u64,
) -> Result<DiskSample, ScanError> {
    let total = blocks.saturating_mul(block_size);
    if total == 0 {
        return Err(ScanError::ZeroCapacity {
            path: path.to_path_buf(),
        });
    }

    let free = available_blocks.saturating_mul(block_size).min(total);
    let used = total - free;
    let free_percent = (free as f64 / total as f64 * 100.0).clamp(0.0, 100.0);

    Ok(DiskSample {
        path: path.to_path_buf(),
        total,
        used,
        free_percent,
    })
}
