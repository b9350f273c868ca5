//! Session configuration

use crate::coord::Layout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Grid and protocol settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Columns of a freshly generated grid
    pub width: i32,
    /// Rows of a freshly generated grid
    pub height: i32,
    /// Outer radius of a cell in world units
    pub hex_size: f32,
    /// How long a detached building waits for its cell
    pub binding_timeout_ms: u64,
    /// Random seed for path generation (None = from entropy)
    pub seed: Option<u64>,
    /// Largest map (width * height) a load may build
    pub max_cells: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            hex_size: 1.0,
            binding_timeout_ms: 10_000,
            seed: None,
            max_cells: 1_000_000,
        }
    }
}

impl GridConfig {
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_hex_size(mut self, hex_size: f32) -> Self {
        self.hex_size = hex_size;
        self
    }

    pub fn with_binding_timeout(mut self, timeout: Duration) -> Self {
        self.binding_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.hex_size)
    }

    pub fn binding_timeout(&self) -> Duration {
        Duration::from_millis(self.binding_timeout_ms)
    }

    /// Load from JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GridConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}
