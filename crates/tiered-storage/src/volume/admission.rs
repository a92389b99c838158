use super::store::VolumeState;
use crate::domain::errors::AdmissionFailure;
use crate::domain::types::VolumeLimits;
use crate::ports::outbound::FileSystemAdapter;
use std::path::Path;

/// Can the volume take one more block?
///
/// Pending reservations count against the block allowance.
pub(super) fn check_admission(
    root: &Path,
    limits: &VolumeLimits,
    state: &VolumeState,
    fs: &dyn FileSystemAdapter,
) -> Result<(), AdmissionFailure> {
    if limits.allowed_block_bytes != 0 && state.block_bytes >= limits.allowed_block_bytes {
        return Err(AdmissionFailure::AllowedSizeLimit {
            allowed: limits.allowed_block_bytes,
            current: state.block_bytes,
        });
    }

    let committed_and_pending = state.block_count + state.reserved;
    if limits.allowed_block_count != 0 && committed_and_pending >= limits.allowed_block_count {
        return Err(AdmissionFailure::AllowedCountLimit {
            allowed: limits.allowed_block_count,
            current: committed_and_pending,
        });
    }

    check_filesystem(root, limits.min_free_bytes, limits.min_free_inodes, fs)
}

/// Free space, free inodes and writability of the filesystem under `root`.
pub(crate) fn check_filesystem(
    root: &Path,
    min_free_bytes: u64,
    min_free_inodes: u64,
    fs: &dyn FileSystemAdapter,
) -> Result<(), AdmissionFailure> {
    let stats_error = |e: crate::domain::errors::FSError| AdmissionFailure::Stats {
        message: e.to_string(),
    };

    if min_free_inodes != 0 {
        let available = fs.available_inodes(root).map_err(stats_error)?;
        if available <= min_free_inodes {
            return Err(AdmissionFailure::InodesLimit {
                available,
                required: min_free_inodes,
            });
        }
    }

    if min_free_bytes != 0 {
        let available = fs.available_bytes(root).map_err(stats_error)?;
        if available < min_free_bytes {
            return Err(AdmissionFailure::SizeLimit {
                available,
                required: min_free_bytes,
            });
        }
    }

    if !fs.is_writable(root) {
        return Err(AdmissionFailure::NotWritable);
    }

    Ok(())
}
