// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic bootstrap of a presentation-capable graphics session.
//!
//! The native API is reached only through [`Driver`]; the window only
//! through [`Presentable`] and [`EventSource`]. Everything in between
//! (device selection, swapchain negotiation, ordered setup and teardown) lives
//! here so it can run against a simulated driver in tests.
pub mod driver;
pub mod error;
pub mod negotiate;
pub mod queue_family;
pub mod selector;
pub mod session;
pub mod surface;
pub mod window;

#[cfg(test)]
pub(crate) mod sim;

pub use driver::{Driver, DriverError, DriverResult, InstanceDesc, SwapchainDesc};
pub use error::BootError;
pub use negotiate::VsyncMode;
pub use queue_family::{QueueFamilies, QueueFamilyIndices};
pub use selector::SelectedDevice;
pub use session::{PresentationPipeline, Session, SessionConfig, SessionPhase};
pub use surface::SurfaceSupport;
pub use window::{EventSource, Presentable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window reports a zero-area framebuffer.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
