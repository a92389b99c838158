//! Integer config values written as expressions.
//!
//! Accepted forms: `1000`, `"1000"`, `"10^9"`, `"1000*1000*1000"`.

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Deserializer};

/// Evaluate a quantity expression.
pub fn parse_quantity(text: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidQuantity(text.to_string());
    let text = text.trim();

    if let Some((base, exp)) = text.split_once('^') {
        let base: u64 = base.trim().parse().map_err(|_| invalid())?;
        let exp: u32 = exp.trim().parse().map_err(|_| invalid())?;
        return base.checked_pow(exp).ok_or_else(invalid);
    }

    text.split('*').try_fold(1u64, |acc, factor| {
        let factor: u64 = factor.trim().parse().map_err(|_| invalid())?;
        acc.checked_mul(factor).ok_or_else(invalid)
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(u64),
    Text(String),
}

/// `deserialize_with` helper for quantity fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawQuantity::deserialize(deserializer)? {
        RawQuantity::Number(n) => Ok(n),
        RawQuantity::Text(text) => parse_quantity(&text).map_err(serde::de::Error::custom),
    }
}
