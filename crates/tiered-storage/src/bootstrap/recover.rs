use crate::domain::errors::StorageError;
use crate::domain::records::{BlockWhereRecord, UnmovedBlockRecord};
use crate::domain::tiering::TierKind;
use crate::metadata::MetadataStore;
use crate::volume::ScannedBlock;
use std::collections::BTreeMap;
use std::path::Path;

/// Scanned blocks grouped by leaf directory, in path order.
fn by_shard(blocks: &[ScannedBlock]) -> BTreeMap<&Path, Vec<&ScannedBlock>> {
    let mut shards: BTreeMap<&Path, Vec<&ScannedBlock>> = BTreeMap::new();
    for block in blocks {
        let dir = block.path.parent().unwrap_or(block.path.as_path());
        shards.entry(dir).or_default().push(block);
    }
    shards
}

/// Rebuild location records for block files found on a Hot or Warm volume.
///
/// Existing records are merged, so cold locations survive and running the
/// recovery twice changes nothing. A record pointing at another local file
/// that still exists keeps it. Records and queue entries are written one
/// batch per leaf directory. Returns the number of records written.
pub(super) fn reindex_local(
    kind: TierKind,
    blocks: &[ScannedBlock],
    metadata: &MetadataStore,
    cold_eligible: bool,
) -> Result<usize, StorageError> {
    let mut indexed = 0;

    for shard in by_shard(blocks).into_values() {
        let mut records = Vec::with_capacity(shard.len());
        let mut queued = Vec::new();

        for block in shard {
            let mut record = match metadata.get(&block.hash)? {
                Some(existing) => existing,
                None => BlockWhereRecord::local(block.hash.as_str(), kind, block.path.as_path()),
            };

            if let Some(current) = record.local_path() {
                if current != block.path && current.is_file() {
                    tracing::warn!(
                        "[bootstrap] duplicate of {} at {}, keeping {}",
                        block.hash,
                        block.path.display(),
                        current.display()
                    );
                    continue;
                }
            }

            record.set_local(kind, block.path.as_path());
            if cold_eligible && !record.is_in(TierKind::Cold) {
                queued.push(UnmovedBlockRecord::new(
                    block.modified_nanos,
                    block.hash.as_str(),
                ));
            }
            records.push(record);
        }

        metadata.put_many(&records)?;
        metadata.enqueue_many(&queued)?;
        indexed += records.len();
    }

    Ok(indexed)
}

/// Rebuild cold locations for block files found on a cold disk.
pub(super) fn reindex_cold(
    blocks: &[ScannedBlock],
    metadata: &MetadataStore,
) -> Result<usize, StorageError> {
    for shard in by_shard(blocks).into_values() {
        let records = shard
            .into_iter()
            .map(|block| {
                let cold_path = block.path.to_string_lossy().into_owned();
                Ok(match metadata.get(&block.hash)? {
                    Some(mut existing) => {
                        existing.set_cold(cold_path);
                        existing
                    }
                    None => BlockWhereRecord::cold(block.hash.as_str(), cold_path),
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        metadata.put_many(&records)?;
    }
    Ok(blocks.len())
}
