// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, NulError};

use ash::vk;
use raw_window_handle::HandleError;
use thiserror::Error;

use crate::queue_family::QueueFamilies;
use crate::window::Presentable;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),
    #[error("window handle unavailable: {0}")]
    Handle(#[from] HandleError),
    #[error("failed to load the vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),
    #[error("name contains an interior nul byte")]
    InvalidName(#[from] NulError),
    #[error("{0} has not been created")]
    NotReady(&'static str),
}

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Clone, Copy, Debug)]
pub struct InstanceDesc<'a> {
    pub app_name: &'a str,
    pub engine_name: &'a str,
    pub enable_validation: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub queue_families: QueueFamilies,
}

/// The native graphics API as seen by the session.
///
/// Handles are plain values; the driver never owns what it hands out. The
/// instance and the logical device are singletons kept inside the driver,
/// so at most one of each exists at a time. `destroy_*` calls must tolerate
/// being made for objects that no longer exist.
pub trait Driver {
    fn validation_supported(&self) -> DriverResult<bool>;

    fn create_instance(
        &mut self,
        desc: &InstanceDesc<'_>,
        target: &dyn Presentable,
    ) -> DriverResult<()>;
    fn destroy_instance(&mut self);

    fn create_debug_messenger(&mut self) -> DriverResult<vk::DebugUtilsMessengerEXT>;
    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);

    fn create_surface(&mut self, target: &dyn Presentable) -> DriverResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(&self) -> DriverResult<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, device: vk::PhysicalDevice) -> String;
    fn queue_family_properties(
        &self,
        device: vk::PhysicalDevice,
    ) -> DriverResult<Vec<vk::QueueFamilyProperties>>;
    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> DriverResult<bool>;
    fn device_extensions(&self, device: vk::PhysicalDevice) -> DriverResult<Vec<String>>;

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> DriverResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> DriverResult<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> DriverResult<Vec<vk::PresentModeKHR>>;

    /// `families` holds each queue family index once.
    fn create_device(
        &mut self,
        device: vk::PhysicalDevice,
        families: &[u32],
        extensions: &[&CStr],
    ) -> DriverResult<()>;
    fn device_queue(&self, family: u32) -> DriverResult<vk::Queue>;
    fn destroy_device(&mut self);

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> DriverResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> DriverResult<vk::ImageView>;
    fn destroy_image_view(&mut self, view: vk::ImageView);

    /// Blocks until the logical device has no work in flight. No-op without a
    /// device.
    fn wait_idle(&self);
}
