use crate::domain::compression::BlockCompressor;
use crate::domain::errors::StorageError;
use crate::domain::layout::DirLayout;
use crate::domain::types::VolumeLimits;
use crate::ports::outbound::{ColdStorage, FileSystemAdapter};
use crate::volume::{ScannedBlock, Volume};
use std::path::Path;
use std::sync::Arc;

/// Cold storage on a local or network-mounted directory.
///
/// Blocks are copied in their compressed form, so a cold file is byte for
/// byte the local file. The cold path recorded for a block is its file path.
pub struct ColdDisk {
    id: String,
    volume: Volume,
}

impl ColdDisk {
    pub fn new(
        root: impl AsRef<Path>,
        limits: VolumeLimits,
        fs: Arc<dyn FileSystemAdapter>,
        compressor: Arc<dyn BlockCompressor>,
    ) -> Self {
        Self::with_layout(root, DirLayout::COLD, limits, fs, compressor)
    }

    pub fn with_layout(
        root: impl AsRef<Path>,
        layout: DirLayout,
        limits: VolumeLimits,
        fs: Arc<dyn FileSystemAdapter>,
        compressor: Arc<dyn BlockCompressor>,
    ) -> Self {
        let root = root.as_ref();
        Self {
            id: format!("disk:{}", root.display()),
            volume: Volume::new(root, layout, limits, fs, compressor),
        }
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn reset(&self) -> Result<(), StorageError> {
        self.volume.reset()
    }

    pub fn restore(&self) -> Result<Vec<ScannedBlock>, StorageError> {
        self.volume.restore()
    }

    fn checked_path<'a>(&self, hash: &str, cold_path: &'a str) -> Result<&'a Path, StorageError> {
        let path = Path::new(cold_path);
        if !self.volume.contains(path) {
            return Err(StorageError::ColdStorage {
                message: format!("{} does not own {} (block {})", self.id, cold_path, hash),
            });
        }
        Ok(path)
    }
}

impl ColdStorage for ColdDisk {
    fn id(&self) -> &str {
        &self.id
    }

    fn owns(&self, cold_path: &str) -> bool {
        self.volume.contains(Path::new(cold_path))
    }

    fn move_block(&self, hash: &str, local_path: &Path) -> Result<String, StorageError> {
        let compressed = std::fs::read(local_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::BlockNotFound {
                hash: hash.to_string(),
            },
            _ => StorageError::io(local_path, e),
        })?;

        let path = self.volume.write_raw(hash, &compressed)?;
        tracing::debug!("[cold] {} stored {} at {}", self.id, hash, path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    fn get_block(&self, hash: &str, cold_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.checked_path(hash, cold_path)?;
        self.volume.read(hash, path)
    }

    fn delete_block(&self, hash: &str, cold_path: &str) -> Result<(), StorageError> {
        let path = self.checked_path(hash, cold_path)?;
        self.volume.delete(hash, path)
    }

    fn is_able_to_store_block(&self) -> bool {
        match self.volume.check() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!("[cold] {} cannot store blocks: {}", self.id, reason);
                false
            }
        }
    }

    fn used_bytes(&self) -> u64 {
        self.volume.usage().block_bytes
    }

    fn available_bytes(&self) -> u64 {
        crate::domain::strategy::PlacementCandidate::available_bytes(&self.volume)
    }

    fn block_count(&self) -> u64 {
        self.volume.usage().block_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compression::ZlibCompressor;
    use crate::test_utils::{mock_fs, sample_block, test_volume};

    fn cold_disk(root: &Path) -> ColdDisk {
        ColdDisk::new(
            root,
            VolumeLimits::unlimited(),
            mock_fs(),
            Arc::new(ZlibCompressor::best()),
        )
    }

    #[test]
    fn test_move_copies_compressed_file() {
        let local_dir = tempfile::tempdir().unwrap();
        let cold_dir = tempfile::tempdir().unwrap();
        let local = test_volume(
            local_dir.path(),
            DirLayout::HOT,
            VolumeLimits::unlimited(),
            mock_fs(),
        );
        let cold = cold_disk(cold_dir.path());

        let (hash, data) = sample_block(11);
        let local_path = local.write(&hash, &data).unwrap();
        let cold_path = cold.move_block(&hash, &local_path).unwrap();

        assert!(cold.owns(&cold_path));
        assert!(cold_path.contains("CK0"));
        assert_eq!(
            std::fs::read(&cold_path).unwrap(),
            std::fs::read(&local_path).unwrap()
        );
        assert_eq!(cold.get_block(&hash, &cold_path).unwrap(), data);
        assert_eq!(cold.block_count(), 1);
    }

    #[test]
    fn test_foreign_path_rejected() {
        let cold_dir = tempfile::tempdir().unwrap();
        let cold = cold_disk(cold_dir.path());

        assert!(!cold.owns("/elsewhere/CK0/0/ab.dat"));
        assert!(matches!(
            cold.get_block("ab", "/elsewhere/CK0/0/ab.dat"),
            Err(StorageError::ColdStorage { .. })
        ));
    }

    #[test]
    fn test_move_missing_local_file() {
        let cold_dir = tempfile::tempdir().unwrap();
        let cold = cold_disk(cold_dir.path());

        let missing = cold_dir.path().join("nope.dat");
        assert!(matches!(
            cold.move_block("abcd", &missing),
            Err(StorageError::BlockNotFound { .. })
        ));
        assert_eq!(cold.block_count(), 0);
    }

    #[test]
    fn test_get_blocks_preserves_order() {
        let local_dir = tempfile::tempdir().unwrap();
        let cold_dir = tempfile::tempdir().unwrap();
        let local = test_volume(
            local_dir.path(),
            DirLayout::WARM,
            VolumeLimits::unlimited(),
            mock_fs(),
        );
        let cold = cold_disk(cold_dir.path());

        let mut requests = Vec::new();
        let mut expected = Vec::new();
        for round in [3, 1, 2] {
            let (hash, data) = sample_block(round);
            let path = local.write(&hash, &data).unwrap();
            requests.push((hash.clone(), cold.move_block(&hash, &path).unwrap()));
            expected.push(data);
        }

        assert_eq!(cold.get_blocks(&requests).unwrap(), expected);
    }

    #[test]
    fn test_delete_block() {
        let local_dir = tempfile::tempdir().unwrap();
        let cold_dir = tempfile::tempdir().unwrap();
        let local = test_volume(
            local_dir.path(),
            DirLayout::HOT,
            VolumeLimits::unlimited(),
            mock_fs(),
        );
        let cold = cold_disk(cold_dir.path());
        let (hash, data) = sample_block(4);
        let path = local.write(&hash, &data).unwrap();
        let cold_path = cold.move_block(&hash, &path).unwrap();

        cold.delete_block(&hash, &cold_path).unwrap();

        assert_eq!(cold.block_count(), 0);
        assert!(!Path::new(&cold_path).exists());
    }
}
