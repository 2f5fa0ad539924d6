//! Deterministic checkpoint/restart.
//!
//! On-disk layout: a 4-byte magic, a little-endian u16 schema version,
//! then a MessagePack body. The body repeats the schema version so the
//! record stays self-describing once decoded. Loading rejects wrong magic
//! (including the legacy pickle prefix), undecodable bodies, versions
//! newer than this build, and — when the caller provides one — a
//! non-matching config hash. Each cause is a distinct error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::accounting::AccountState;
use crate::brackets::BracketState;
use crate::config::{ProviderConfig, SimulatorConfig};
use crate::rng::SimRng;

pub const CHECKPOINT_MAGIC: [u8; 4] = *b"BSIM";
pub const CHECKPOINT_SCHEMA_VERSION: u16 = 1;

/// Pickle protocol 2+ opcode; the one legacy format worth naming.
const PICKLE_PREFIX: u8 = 0x80;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("bad checkpoint magic {found:?}; expected {expected:?}")]
    BadMagic { found: [u8; 4], expected: [u8; 4] },

    #[error("legacy pickle checkpoint format is not supported")]
    LegacyPickle,

    #[error("checkpoint file truncated: {0} bytes")]
    Truncated(usize),

    #[error("checkpoint schema version {found} is newer than supported {supported}")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("config hash mismatch: checkpoint has {found}, expected {expected}")]
    ConfigHashMismatch { found: String, expected: String },

    #[error("checkpoint decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("checkpoint encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Serializable snapshot of the full simulator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationCheckpoint {
    pub schema_version: u16,
    pub backtest_id: String,
    pub config_hash: String,
    pub provider_config: ProviderConfig,
    pub simulator_config: SimulatorConfig,
    pub account_state: AccountState,
    pub current_day: Option<DateTime<Utc>>,
    pub peak_equity: Decimal,
    pub daily_start_equity: Decimal,
    pub kill_switch_engaged: bool,
    pub active_brackets: Vec<BracketState>,
    pub trades_today: u32,
    pub starting_equity: Decimal,
    pub rng_state: SimRng,
    pub next_fill_id: u64,
}

impl SimulationCheckpoint {
    /// Persist to disk: magic, version, MessagePack body.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = rmp_serde::to_vec_named(self)?;
        let mut buf = Vec::with_capacity(6 + body.len());
        buf.extend_from_slice(&CHECKPOINT_MAGIC);
        buf.extend_from_slice(&CHECKPOINT_SCHEMA_VERSION.to_le_bytes());
        buf.extend_from_slice(&body);
        fs::write(path, buf)?;
        Ok(())
    }

    /// Load from disk, optionally validating the config hash.
    pub fn load(
        path: &Path,
        expected_config_hash: Option<&str>,
    ) -> Result<Self, CheckpointError> {
        let bytes = fs::read(path)?;
        if bytes.first() == Some(&PICKLE_PREFIX) {
            return Err(CheckpointError::LegacyPickle);
        }
        if bytes.len() < 6 {
            return Err(CheckpointError::Truncated(bytes.len()));
        }
        let found: [u8; 4] = bytes[..4].try_into().expect("length checked above");
        if found != CHECKPOINT_MAGIC {
            return Err(CheckpointError::BadMagic {
                found,
                expected: CHECKPOINT_MAGIC,
            });
        }
        let version = u16::from_le_bytes(bytes[4..6].try_into().expect("length checked above"));
        if version > CHECKPOINT_SCHEMA_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: version,
                supported: CHECKPOINT_SCHEMA_VERSION,
            });
        }
        let checkpoint: Self = rmp_serde::from_slice(&bytes[6..])?;
        if let Some(expected) = expected_config_hash {
            if checkpoint.config_hash != expected {
                return Err(CheckpointError::ConfigHashMismatch {
                    found: checkpoint.config_hash,
                    expected: expected.to_string(),
                });
            }
        }
        Ok(checkpoint)
    }
}
