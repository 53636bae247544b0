//! Engine configuration.
//!
//! ## Sources (later sources win)
//!
//! | Source                           | Example                                   |
//! |----------------------------------|-------------------------------------------|
//! | built-in defaults                | [`EngineConfig::default`]                 |
//! | optional TOML file               | `blockwork.toml`                          |
//! | environment, prefix `BLOCKWORK_` | `BLOCKWORK_MAX_OPERATIONS_PER_TICK=250`   |

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest tick rate the agent will accept.
pub const MAX_TICK_RATE_HZ: f32 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum cell mutations any single operation performs per tick.
    pub max_operations_per_tick: usize,
    /// Journals kept per owner for later undo/redo; the oldest go first.
    pub undo_cache_per_owner: usize,
    /// How often the agent ticks the scheduler.
    pub tick_rate_hz: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_operations_per_tick: 1000,
            undo_cache_per_owner: 50,
            tick_rate_hz: 20.0,
        }
    }
}

impl EngineConfig {
    /// Load from an optional file plus `BLOCKWORK_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let loaded: EngineConfig = builder
            .add_source(config::Environment::with_prefix("BLOCKWORK").try_parsing(true))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_operations_per_tick == 0 {
            return Err(EngineError::InvalidConfig(
                "max_operations_per_tick must be at least 1".into(),
            ));
        }
        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz <= MAX_TICK_RATE_HZ) {
            return Err(EngineError::InvalidConfig(format!(
                "tick_rate_hz must be in (0, {MAX_TICK_RATE_HZ}], got {}",
                self.tick_rate_hz
            )));
        }
        Ok(())
    }
}
