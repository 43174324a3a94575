// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::driver::Driver;
use crate::error::BootError;
use crate::queue_family::{find_queue_families, QueueFamilies};
use crate::surface::{query_capabilities, SurfaceSupport};

/// Device extensions a device must offer to be considered at all.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// The device chosen for the session, with everything learned while
/// qualifying it.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilies,
    pub support: SurfaceSupport,
}

/// Ordered search: `probe` is run on each candidate in turn and the first
/// `Some` is returned. Later candidates are never probed once one qualifies.
pub fn first_suitable<I, T, F>(candidates: I, probe: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Option<T>,
{
    candidates.into_iter().find_map(probe)
}

/// Whether every required extension appears in `available`.
pub fn supports_required_extensions(available: &[String]) -> bool {
    REQUIRED_DEVICE_EXTENSIONS.iter().all(|req| {
        let req = req.to_string_lossy();
        available.iter().any(|a| *a == req)
    })
}

/// Qualifies one device: complete queue families, required extensions, and
/// at least one surface format and present mode.
pub fn evaluate_device<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Option<SelectedDevice> {
    let name = driver.device_name(device);

    let queue_families = match find_queue_families(driver, device, surface) {
        Ok(indices) => match indices.complete() {
            Some(families) => families,
            None => {
                debug!("{name}: rejected, no graphics+present queue families");
                return None;
            }
        },
        Err(e) => {
            warn!("{name}: queue family query failed: {e}");
            return None;
        }
    };

    let extensions = match driver.device_extensions(device) {
        Ok(exts) => exts,
        Err(e) => {
            warn!("{name}: extension query failed: {e}");
            return None;
        }
    };
    if !supports_required_extensions(&extensions) {
        debug!("{name}: rejected, missing required device extensions");
        return None;
    }

    // Only query the surface once the swapchain extension is known to exist.
    let support = match query_capabilities(driver, device, surface) {
        Ok(support) => support,
        Err(e) => {
            warn!("{name}: surface capability query failed: {e}");
            return None;
        }
    };
    if !support.is_adequate() {
        debug!(
            "{name}: rejected, {} formats / {} present modes",
            support.formats.len(),
            support.present_modes.len()
        );
        return None;
    }

    Some(SelectedDevice {
        device,
        name,
        queue_families,
        support,
    })
}

/// Picks the first suitable device in the driver's enumeration order. No
/// ranking between several suitable devices.
pub fn pick_physical_device<D: Driver + ?Sized>(
    driver: &D,
    surface: vk::SurfaceKHR,
) -> Result<SelectedDevice, BootError> {
    let devices = driver
        .enumerate_physical_devices()
        .map_err(BootError::ContextCreationFailed)?;
    if devices.is_empty() {
        return Err(BootError::NoSuitableDevice { candidates: 0 });
    }

    let candidates = devices.len();
    let selected = first_suitable(devices, |d| evaluate_device(driver, d, surface))
        .ok_or(BootError::NoSuitableDevice { candidates })?;

    info!(
        "GPU: {} (graphics family {}, present family {})",
        selected.name, selected.queue_families.graphics, selected.queue_families.present
    );
    Ok(selected)
}
