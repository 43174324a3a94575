// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::debug;

use crate::driver::{Driver, DriverResult};

/// Graphics and present queue family indices as found so far. Either may be
/// missing; the pair is complete when both are set, equal or not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// A complete pair of queue family indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Graphics and present submit through the same family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Each family once, graphics first. Device creation takes one queue
    /// create info per distinct family.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// What one queue family can do, in the device's declared order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilyCaps {
    pub graphics: bool,
    pub present: bool,
}

/// Resolves graphics and present indices from families listed in index order.
///
/// One pass: a present-capable family records the present index, a
/// graphics-capable family the graphics index, and the scan stops as soon as
/// both are set. A split pair found before any combined family is kept.
pub fn resolve_queue_families(families: &[FamilyCaps]) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    for (i, family) in families.iter().enumerate() {
        if family.present {
            indices.present_family = Some(i as u32);
        }
        if family.graphics {
            indices.graphics_family = Some(i as u32);
        }
        if indices.is_complete() {
            break;
        }
    }
    indices
}

/// Queries `device`'s queue families and their present support for
/// `surface`, then resolves them. A failed support query counts as "cannot
/// present".
pub fn find_queue_families<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> DriverResult<QueueFamilyIndices> {
    let props = driver.queue_family_properties(device)?;
    let caps: Vec<FamilyCaps> = props
        .iter()
        .enumerate()
        .map(|(i, q)| FamilyCaps {
            graphics: q.queue_count > 0 && q.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present: driver
                .surface_support(device, i as u32, surface)
                .unwrap_or(false),
        })
        .collect();

    let indices = resolve_queue_families(&caps);
    debug!(
        "queue families: {} listed, graphics={:?} present={:?}",
        caps.len(),
        indices.graphics_family,
        indices.present_family
    );
    Ok(indices)
}
