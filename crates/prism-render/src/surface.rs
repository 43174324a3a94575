// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::driver::{Driver, DriverResult};

/// What a surface supports on one particular device. Only valid for the
/// device and surface it was queried with; re-query after a resize.
#[derive(Clone, Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A swapchain needs at least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Read-only queries against the driver. An error means the device cannot
/// present to this surface.
pub fn query_capabilities<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> DriverResult<SurfaceSupport> {
    Ok(SurfaceSupport {
        capabilities: driver.surface_capabilities(device, surface)?,
        formats: driver.surface_formats(device, surface)?,
        present_modes: driver.present_modes(device, surface)?,
    })
}
