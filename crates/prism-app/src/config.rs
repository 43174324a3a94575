// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use prism_render::{SessionConfig, VsyncMode};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "Prism".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(default)]
pub struct RenderCfg {
    /// Unset means "on in debug builds".
    pub validation: Option<bool>,
    pub vsync_mode: VsyncModeCfg,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VsyncModeCfg {
    #[default]
    Mailbox,
    Fifo,
    Immediate,
}

impl From<VsyncModeCfg> for VsyncMode {
    fn from(mode: VsyncModeCfg) -> Self {
        match mode {
            VsyncModeCfg::Mailbox => VsyncMode::Mailbox,
            VsyncModeCfg::Fifo => VsyncMode::Fifo,
            VsyncModeCfg::Immediate => VsyncMode::Immediate,
        }
    }
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config")
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            app_name: self.window.title.clone(),
            enable_validation: self.render.validation.unwrap_or(defaults.enable_validation),
            vsync_mode: self.render.vsync_mode.into(),
            ..defaults
        }
    }
}

/// Reads `path`. A missing file gives the defaults; a malformed one is
/// reported and also falls back to the defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match AppCfg::parse(&s) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}: {e:#}; using defaults", path.display());
                AppCfg::default()
            }
        },
        Err(_) => AppCfg::default(),
    }
}
