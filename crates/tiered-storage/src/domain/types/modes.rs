use crate::domain::errors::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How the engine treats existing volumes and metadata at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum BootMode {
    /// Wipe volumes and metadata.
    Start,
    /// Keep everything, recount usage.
    #[default]
    Restart,
    /// Rebuild metadata from the files on disk.
    Recover,
    Repair,
    RepairAndRecover,
}

impl BootMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootMode::Start => "start",
            BootMode::Restart => "restart",
            BootMode::Recover => "recover",
            BootMode::Repair => "repair",
            BootMode::RepairAndRecover => "repair_and_recover",
        }
    }
}

impl FromStr for BootMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(BootMode::Start),
            "restart" => Ok(BootMode::Restart),
            "recover" => Ok(BootMode::Recover),
            "repair" => Ok(BootMode::Repair),
            "repair_and_recover" => Ok(BootMode::RepairAndRecover),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for BootMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier combination served by the Smart Store (`storage_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TieringMode {
    Hot,
    Warm,
    HotAndWarm,
    HotAndCold,
    WarmAndCold,
    HotWarmAndCold,
}

impl TieringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieringMode::Hot => "hot",
            TieringMode::Warm => "warm",
            TieringMode::HotAndWarm => "hot_and_warm",
            TieringMode::HotAndCold => "hot_and_cold",
            TieringMode::WarmAndCold => "warm_and_cold",
            TieringMode::HotWarmAndCold => "hot_warm_and_cold",
        }
    }

    pub fn uses_hot(&self) -> bool {
        matches!(
            self,
            TieringMode::Hot
                | TieringMode::HotAndWarm
                | TieringMode::HotAndCold
                | TieringMode::HotWarmAndCold
        )
    }

    pub fn uses_warm(&self) -> bool {
        matches!(
            self,
            TieringMode::Warm
                | TieringMode::HotAndWarm
                | TieringMode::WarmAndCold
                | TieringMode::HotWarmAndCold
        )
    }

    pub fn uses_cold(&self) -> bool {
        matches!(
            self,
            TieringMode::HotAndCold | TieringMode::WarmAndCold | TieringMode::HotWarmAndCold
        )
    }
}

impl FromStr for TieringMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(TieringMode::Hot),
            "warm" => Ok(TieringMode::Warm),
            "hot_and_warm" => Ok(TieringMode::HotAndWarm),
            "hot_and_cold" => Ok(TieringMode::HotAndCold),
            "warm_and_cold" => Ok(TieringMode::WarmAndCold),
            "hot_warm_and_cold" => Ok(TieringMode::HotWarmAndCold),
            other => Err(ConfigError::UnsupportedStorageType(other.to_string())),
        }
    }
}

impl TryFrom<String> for TieringMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TieringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When cached blocks reach the durable tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum CacheWritePolicy {
    /// Durable write first, cache second.
    #[default]
    WriteThrough,
    /// Cache first, durable tiers on flush.
    WriteBack,
}

impl FromStr for CacheWritePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "writethrough" => Ok(CacheWritePolicy::WriteThrough),
            "writeback" => Ok(CacheWritePolicy::WriteBack),
            other => Err(ConfigError::UnsupportedCacheWrite(other.to_string())),
        }
    }
}

impl TryFrom<String> for CacheWritePolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
