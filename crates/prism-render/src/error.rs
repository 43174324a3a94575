// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::driver::DriverError;

/// Why a session could not be brought up. Every variant is fatal: setup stops
/// at the first failure and unwinds what was already created.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("failed to create the graphics context")]
    ContextCreationFailed(#[source] DriverError),

    #[error("validation layers were requested but the driver does not provide them")]
    ValidationLayerUnavailable,

    #[error("failed to create the debug messenger")]
    DebugChannelCreationFailed(#[source] DriverError),

    #[error("failed to create the presentation surface")]
    SurfaceCreationFailed(#[source] DriverError),

    #[error("no suitable GPU found ({candidates} device(s) enumerated)")]
    NoSuitableDevice { candidates: usize },

    #[error("failed to create the logical device")]
    DeviceCreationFailed(#[source] DriverError),

    #[error("failed to create the swapchain")]
    PipelineCreationFailed(#[source] DriverError),

    #[error("failed to create swapchain image views")]
    ImageViewCreationFailed(#[source] DriverError),
}
