use crate::domain::errors::StorageError;
use crate::domain::tiering::{TierKind, TieringState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whereabouts of a block.
///
/// One record per hash. Created on the first successful write to any tier and
/// updated in place as the block moves between tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWhereRecord {
    /// Hash is the record key, so it is not repeated in the value.
    #[serde(skip)]
    pub hash: String,
    #[serde(rename = "tr")]
    pub tiering: TieringState,
    /// Path of the block file on a Hot or Warm volume.
    #[serde(rename = "vp", default, skip_serializing_if = "Option::is_none")]
    pub block_path: Option<PathBuf>,
    /// Location returned by the cold backend.
    #[serde(rename = "cp", default, skip_serializing_if = "Option::is_none")]
    pub cold_path: Option<String>,
}

impl BlockWhereRecord {
    /// Record for a block that was just written to a local tier.
    pub fn local(hash: impl Into<String>, tier: TierKind, path: impl Into<PathBuf>) -> Self {
        Self {
            hash: hash.into(),
            tiering: TieringState::only(tier),
            block_path: Some(path.into()),
            cold_path: None,
        }
    }

    /// Record for a block known only to the cold tier.
    pub fn cold(hash: impl Into<String>, cold_path: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            tiering: TieringState::only(TierKind::Cold),
            block_path: None,
            cold_path: Some(cold_path.into()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(hash: &str, data: &[u8]) -> Result<Self, StorageError> {
        let mut record: BlockWhereRecord = serde_json::from_slice(data)?;
        record.hash = hash.to_string();
        Ok(record)
    }

    /// Mark the block as stored on a local tier at `path`, replacing any
    /// other local copy.
    pub fn set_local(&mut self, tier: TierKind, path: impl Into<PathBuf>) {
        self.tiering.remove(TierKind::Hot);
        self.tiering.remove(TierKind::Warm);
        self.tiering.insert(tier);
        self.block_path = Some(path.into());
    }

    /// Mark the block as stored on the cold tier.
    pub fn set_cold(&mut self, cold_path: impl Into<String>) {
        self.tiering.insert(TierKind::Cold);
        self.cold_path = Some(cold_path.into());
    }

    /// Forget the local copy (after local deletion).
    pub fn clear_local(&mut self) {
        self.tiering.remove(TierKind::Hot);
        self.tiering.remove(TierKind::Warm);
        self.block_path = None;
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.tiering.local_tier()?;
        self.block_path.as_deref()
    }

    pub fn is_in(&self, tier: TierKind) -> bool {
        self.tiering.contains(tier)
    }
}
