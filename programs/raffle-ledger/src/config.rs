use anchor_lang::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::LedgerError;

/// Runtime settings. Defaults come from `constants`; each field can be
/// overridden by a `RAFFLE_LEDGER_*` environment variable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    pub checkpoint_interval: u64,
    pub neighbourhood: u64,
    pub max_transaction_retries: u32,
    pub bind_address: String,
    /// Bearer token for admin routes. Admin routes refuse everyone when unset.
    #[serde(skip_serializing)]
    pub admin_token: Option<String>,
    /// Secret the instant-win key is derived from.
    #[serde(skip_serializing)]
    pub instant_win_secret: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: CHECKPOINT_INTERVAL,
            neighbourhood: VERIFY_NEIGHBOURHOOD,
            max_transaction_retries: MAX_TRANSACTION_RETRIES,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            admin_token: None,
            instant_win_secret: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut config = Self::default();

        if let Some(v) = var("CHECKPOINT_INTERVAL") {
            config.checkpoint_interval = parse_number(&v)?;
        }
        if let Some(v) = var("NEIGHBOURHOOD") {
            config.neighbourhood = parse_number(&v)?;
        }
        if let Some(v) = var("MAX_TX_RETRIES") {
            config.max_transaction_retries = parse_number(&v)?;
        }
        if let Some(v) = var("BIND_ADDRESS") {
            config.bind_address = v;
        }
        config.admin_token = var("ADMIN_TOKEN").filter(|v| !v.is_empty());
        config.instant_win_secret = var("INSTANT_WIN_SECRET").filter(|v| !v.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        require!(
            self.checkpoint_interval >= MIN_CHECKPOINT_INTERVAL,
            LedgerError::InvalidConfig
        );
        require!(self.max_transaction_retries > 0, LedgerError::InvalidConfig);
        require!(!self.bind_address.is_empty(), LedgerError::InvalidConfig);
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| error!(LedgerError::InvalidConfig))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.checkpoint_interval, 100);
        assert_eq!(config.neighbourhood, 5);
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("RAFFLE_LEDGER_CHECKPOINT_INTERVAL", "10"),
            ("RAFFLE_LEDGER_ADMIN_TOKEN", "s3cret"),
            ("RAFFLE_LEDGER_BIND_ADDRESS", "0.0.0.0:9000"),
        ]))
        .unwrap();
        assert_eq!(config.checkpoint_interval, 10);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn test_interval_must_leave_room_for_checkpoint_entry() {
        for interval in ["0", "1"] {
            let config = LedgerConfig::from_lookup(lookup(&[("RAFFLE_LEDGER_CHECKPOINT_INTERVAL", interval)]));
            assert!(config.is_err());
        }
        assert!(LedgerConfig::from_lookup(lookup(&[("RAFFLE_LEDGER_CHECKPOINT_INTERVAL", "2")])).is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(LedgerConfig::from_lookup(lookup(&[("RAFFLE_LEDGER_CHECKPOINT_INTERVAL", "0")])).is_err());
        assert!(LedgerConfig::from_lookup(lookup(&[("RAFFLE_LEDGER_MAX_TX_RETRIES", "many")])).is_err());
    }
}
