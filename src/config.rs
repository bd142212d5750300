// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.io.fps > 0.0) {
            bail!("io.fps must be positive, got {}", self.io.fps);
        }
        if self.refine.median_window == 0 {
            bail!("refine.median_window must be at least 1");
        }
        if let Some(window) = self.refine.savgol_window {
            if window < 3 || window % 2 == 0 {
                bail!("refine.savgol_window must be odd and >= 3, got {}", window);
            }
        }
        if self.standardize.origin == self.standardize.scale_reference {
            bail!("standardize.origin and standardize.scale_reference must differ");
        }
        if !self.standardize.origin.is_reference() || !self.standardize.scale_reference.is_reference() {
            bail!("standardization anchors must be reference points");
        }
        if !(self.standardize.scale_length > 0.0) {
            bail!("standardize.scale_length must be positive");
        }
        if self.workers.0 == 0 {
            bail!("workers must be at least 1");
        }
        Ok(())
    }
}
