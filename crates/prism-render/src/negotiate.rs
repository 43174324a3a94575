// SPDX-License-Identifier: CEPL-1.0
//! Pure selection functions over what the surface reports. Each one is an
//! ordered search: candidates are tried in a fixed preference order and the
//! first one the surface supports wins.
use ash::vk;

use crate::RenderSize;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VsyncMode {
    /// Tear-free, low latency; FIFO when unavailable.
    #[default]
    Mailbox,
    /// Locked to the display refresh.
    Fifo,
    /// Uncapped, may tear.
    Immediate,
}

impl VsyncMode {
    fn preference(self) -> &'static [vk::PresentModeKHR] {
        match self {
            VsyncMode::Mailbox => &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
            VsyncMode::Fifo => &[vk::PresentModeKHR::FIFO],
            VsyncMode::Immediate => &[
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::FIFO,
            ],
        }
    }
}

/// Picks 8-bit BGRA with the non-linear sRGB color space, otherwise the first
/// format the surface listed.
///
/// `formats` must not be empty; device selection rejects devices whose
/// surface reports no formats.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space)
        .unwrap_or_else(|| formats[0])
}

/// MAILBOX when offered, FIFO otherwise. FIFO is always available, so it
/// is returned even when `modes` does not list it.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    choose_present_mode_with(modes, VsyncMode::Mailbox)
}

pub fn choose_present_mode_with(modes: &[vk::PresentModeKHR], mode: VsyncMode) -> vk::PresentModeKHR {
    mode.preference()
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface dictates the extent unless it reports `u32::MAX`, in which
/// case the framebuffer size is used, clamped into the supported range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum so the driver never blocks us on its internal
/// image. A `max_image_count` of 0 means no upper bound.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&a| caps.supported_composite_alpha.contains(a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

// Info only
pub(crate) fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM",
        vk::Format::R16G16B16A16_SFLOAT => "R16G16B16A16_SFLOAT",
        _ => "OTHER",
    }
}

pub(crate) fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}
