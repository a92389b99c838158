use crate::domain::errors::{AdmissionFailure, StorageError};
use crate::domain::types::BootMode;
use crate::ports::outbound::FileSystemAdapter;
use crate::volume::{check_filesystem, ScannedBlock, Volume};
use std::fmt;

/// Why a configured volume was left out at startup.
#[derive(Debug)]
pub(super) enum Rejection {
    /// Wiping or scanning the volume failed.
    Io(StorageError),
    /// Stored blocks already exceed the volume's allowance.
    OverAllowance { block_count: u64, block_bytes: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Io(e) => write!(f, "{}", e),
            Rejection::OverAllowance {
                block_count,
                block_bytes,
            } => write!(
                f,
                "stored {} blocks / {} bytes exceed the allowance",
                block_count, block_bytes
            ),
        }
    }
}

/// A volume that survived preparation.
pub(super) struct Prepared {
    /// Block files found on disk (empty after a wipe).
    pub blocks: Vec<ScannedBlock>,
    /// `None` when the volume may join the rotation.
    pub admission: Option<AdmissionFailure>,
}

/// Bring one volume into the state the boot mode asks for.
///
/// `start` wipes it; `restart` and `recover` recount it from disk, and
/// `recover` also refuses a volume already over its allowance.
pub(super) fn prepare(
    volume: &Volume,
    mode: BootMode,
    min_free_bytes: u64,
    fs: &dyn FileSystemAdapter,
) -> Result<Prepared, Rejection> {
    if let Err(e) = std::fs::create_dir_all(volume.root()) {
        tracing::debug!(
            "[bootstrap] could not create {}: {}",
            volume.root().display(),
            e
        );
    }

    let blocks = match mode {
        BootMode::Start => {
            volume.reset().map_err(Rejection::Io)?;
            Vec::new()
        }
        _ => volume.restore().map_err(Rejection::Io)?,
    };

    if mode == BootMode::Recover {
        let usage = volume.usage();
        if volume.limits().exceeded_by(usage.block_count, usage.block_bytes) {
            return Err(Rejection::OverAllowance {
                block_count: usage.block_count,
                block_bytes: usage.block_bytes,
            });
        }
    }

    let limits = volume.limits();
    let floor = min_free_bytes.max(limits.min_free_bytes);
    let admission = check_filesystem(volume.root(), floor, limits.min_free_inodes, fs).err();

    Ok(Prepared { blocks, admission })
}

/// At least half of the configured volumes of a tier must be admitted.
pub(super) fn enforce_threshold(
    tier: &'static str,
    admitted: usize,
    configured: usize,
) -> Result<(), StorageError> {
    if admitted * 2 < configured {
        return Err(StorageError::AdmissionThreshold {
            tier,
            admitted,
            configured,
        });
    }
    Ok(())
}
