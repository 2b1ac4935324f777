mod config;
pub mod database;

pub use config::{AlertsConfig, Config, CountdownConfig, MirrorConfig, NotificationsConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::block::Block;
use crate::error::{ConfigError, Result};

/// Persistent home of the block queue.
///
/// Implementations log their own failures; loads fall back to empty state
/// and saves are best-effort.
pub trait BlockStore {
    fn load_blocks(&self) -> Vec<Block>;
    fn load_active_index(&self) -> Option<usize>;
    fn save_blocks(&mut self, blocks: &[Block]);
    fn save_active_index(&mut self, index: Option<usize>);
    fn clear(&mut self);
}

/// In-memory store for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub blocks: Vec<Block>,
    pub active_index: Option<usize>,
    pub saves: usize,
}

impl BlockStore for MemoryStore {
    fn load_blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    fn load_active_index(&self) -> Option<usize> {
        self.active_index
    }

    fn save_blocks(&mut self, blocks: &[Block]) {
        self.blocks = blocks.to_vec();
        self.saves += 1;
    }

    fn save_active_index(&mut self, index: Option<usize>) {
        self.active_index = index;
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.active_index = None;
    }
}

/// Returns the data directory, creating it if needed.
///
/// `AGENDATIMER_DATA_DIR` overrides the location entirely. Otherwise it is
/// `~/.config/agendatimer`, or `~/.config/agendatimer-dev` with
/// `AGENDATIMER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("AGENDATIMER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("AGENDATIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("agendatimer-dev")
            } else {
                base_dir.join("agendatimer")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
