//! # Token Configuration
//!
//! Static parameters of a [`crate::token::HoldableToken`]: metadata, owner,
//! supply policy. Loadable from JSON; every field except `owner` has a
//! default.
//!
//! ```json
//! {
//!   "name": "Holdfast Euro",
//!   "symbol": "HEUR",
//!   "decimals": 2,
//!   "owner": "0x4f9c0d6a1e1f6a0b5d3a7e8f9c0d1e2f3a4b5c6d",
//!   "initial_supply": 1000000,
//!   "max_supply": 5000000
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdfast_protocol::config::DEFAULT_DECIMALS;
use holdfast_protocol::{Address, Amount};

/// Errors raised when validating a [`TokenConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The token name is empty.
    #[error("token name must not be empty")]
    EmptyName,

    /// The token symbol is empty.
    #[error("token symbol must not be empty")]
    EmptySymbol,

    /// No owner was configured.
    #[error("token owner must not be the zero address")]
    ZeroOwner,

    /// The initial supply is above the configured cap.
    #[error("initial supply {initial} exceeds max supply {max}")]
    InitialSupplyExceedsCap {
        /// Configured initial supply.
        initial: Amount,
        /// Configured cap.
        max: Amount,
    },

    /// The JSON could not be parsed.
    #[error("invalid token config: {0}")]
    Parse(String),
}

/// Token parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display precision. Informational only; amounts are integers.
    pub decimals: u8,
    /// Initial minter, and the only account allowed to manage minters.
    pub owner: Address,
    /// Whether `mint` is enabled.
    pub mintable: bool,
    /// Whether `burn` and `burn_from` are enabled.
    pub burnable: bool,
    /// Amount credited to the owner at construction.
    pub initial_supply: Amount,
    /// Upper bound on total supply, if any.
    pub max_supply: Option<Amount>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "Holdfast Token".into(),
            symbol: "HOLD".into(),
            decimals: DEFAULT_DECIMALS,
            owner: Address::ZERO,
            mintable: true,
            burnable: true,
            initial_supply: 0,
            max_supply: None,
        }
    }
}

impl TokenConfig {
    /// Default configuration for the given metadata and owner.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, owner: Address) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            owner,
            ..Self::default()
        }
    }

    /// Sets the amount minted to the owner at construction.
    pub fn with_initial_supply(mut self, initial_supply: Amount) -> Self {
        self.initial_supply = initial_supply;
        self
    }

    /// Caps the total supply.
    pub fn with_max_supply(mut self, max_supply: Amount) -> Self {
        self.max_supply = Some(max_supply);
        self
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.owner.is_zero() {
            return Err(ConfigError::ZeroOwner);
        }
        if let Some(max) = self.max_supply {
            if self.initial_supply > max {
                return Err(ConfigError::InitialSupplyExceedsCap {
                    initial: self.initial_supply,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: TokenConfig =
            serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read token config {}", path.display()))?;
        let config = Self::from_json_str(&raw)
            .with_context(|| format!("failed to load token config {}", path.display()))?;
        Ok(config)
    }
}
