// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::init_tracing;
use prism_platform::DesktopWindow;
use prism_render::{BootError, Session};
use prism_render_vk::AshDriver;
use tracing::{error, info};

mod config;

use config::{load_cfg, AppCfg, VsyncModeCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Window title
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Enable or disable the validation layer
    #[arg(long)]
    validation: Option<bool>,
    #[arg(long, value_enum)]
    vsync_mode: Option<VsyncModeCfg>,
}

impl Args {
    fn apply(&self, cfg: &mut AppCfg) {
        if let Some(title) = &self.title {
            cfg.window.title = title.clone();
        }
        if let Some(width) = self.width {
            cfg.window.width = width;
        }
        if let Some(height) = self.height {
            cfg.window.height = height;
        }
        if self.validation.is_some() {
            cfg.render.validation = self.validation;
        }
        if let Some(mode) = self.vsync_mode {
            cfg.render.vsync_mode = mode;
        }
    }
}

fn run(cfg: &AppCfg) -> Result<()> {
    let mut window = DesktopWindow::open(&cfg.window.title, cfg.window.width, cfg.window.height)
        .context("open window")?;

    let driver = AshDriver::load().map_err(BootError::ContextCreationFailed)?;
    let mut session = Session::start(driver, &window, cfg.session_config())?;
    session.run(&mut window)?;

    // Surface and instance go before the window.
    session.shutdown();
    drop(session);
    drop(window);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = load_cfg(&args.config);
    args.apply(&mut cfg);
    info!(
        "{} {}x{}, validation={:?}, vsync={:?}",
        cfg.window.title, cfg.window.width, cfg.window.height, cfg.render.validation, cfg.render.vsync_mode
    );

    if let Err(e) = run(&cfg) {
        error!("{e:#}");
        return Err(e);
    }
    info!("clean shutdown");
    Ok(())
}
