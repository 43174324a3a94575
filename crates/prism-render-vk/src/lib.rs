// SPDX-License-Identifier: CEPL-1.0
//! [`Driver`] implementation over `ash`, with surfaces created through
//! `ash-window`.
use std::ffi::{c_char, CStr, CString};

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use prism_render::{Driver, DriverError, DriverResult, InstanceDesc, Presentable, SwapchainDesc};

mod debug;

use debug::{messenger_create_info, VALIDATION_LAYER};

pub struct AshDriver {
    entry: Entry,
    instance: Option<Instance>,
    surface_loader: Option<surface::Instance>,
    debug_loader: Option<debug_utils::Instance>,
    device: Option<ash::Device>,
    swapchain_loader: Option<swapchain::Device>,
}

impl AshDriver {
    /// Loads the Vulkan library at runtime.
    pub fn load() -> DriverResult<Self> {
        // SAFETY: the loader is kept alive in `entry` for as long as any
        // object created through it.
        let entry = unsafe { Entry::load()? };
        Ok(AshDriver {
            entry,
            instance: None,
            surface_loader: None,
            debug_loader: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self) -> DriverResult<&Instance> {
        self.instance.as_ref().ok_or(DriverError::NotReady("instance"))
    }

    fn surface_loader(&self) -> DriverResult<&surface::Instance> {
        self.surface_loader
            .as_ref()
            .ok_or(DriverError::NotReady("instance"))
    }

    fn device(&self) -> DriverResult<&ash::Device> {
        self.device.as_ref().ok_or(DriverError::NotReady("logical device"))
    }

    fn swapchain_loader(&self) -> DriverResult<&swapchain::Device> {
        self.swapchain_loader
            .as_ref()
            .ok_or(DriverError::NotReady("logical device"))
    }
}

fn c_names(props: &[vk::ExtensionProperties]) -> Vec<String> {
    props
        .iter()
        // SAFETY: the driver fills `extension_name` with a nul-terminated string.
        .map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

impl Driver for AshDriver {
    fn validation_supported(&self) -> DriverResult<bool> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>, target: &dyn Presentable) -> DriverResult<()> {
        let display_raw = target.display_handle()?.as_raw();

        let app_name = CString::new(desc.app_name)?;
        let engine_name = CString::new(desc.engine_name)?;
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app_name.as_ptr(),
            application_version: vk::make_api_version(0, 1, 0, 0),
            p_engine_name: engine_name.as_ptr(),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };

        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(display_raw)?.to_vec();
        let layers: Vec<*const c_char> = if desc.enable_validation {
            extensions.push(debug_utils::NAME.as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Chained so instance creation and destruction are covered too.
        let debug_info = messenger_create_info();
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_next: if desc.enable_validation {
                (&debug_info as *const vk::DebugUtilsMessengerCreateInfoEXT<'_>).cast()
            } else {
                std::ptr::null()
            },
            p_application_info: &app_info,
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            enabled_layer_count: layers.len() as u32,
            pp_enabled_layer_names: layers.as_ptr(),
            ..Default::default()
        };

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };

        if let Ok(available) = unsafe { self.entry.enumerate_instance_extension_properties(None) } {
            debug!("available instance extensions: {:?}", c_names(&available));
        }

        self.surface_loader = Some(surface::Instance::new(&self.entry, &instance));
        if desc.enable_validation {
            self.debug_loader = Some(debug_utils::Instance::new(&self.entry, &instance));
        }
        self.instance = Some(instance);
        info!(
            "vulkan instance created ({} extensions, validation {})",
            extensions.len(),
            if desc.enable_validation { "on" } else { "off" }
        );
        Ok(())
    }

    fn destroy_instance(&mut self) {
        self.debug_loader = None;
        self.surface_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(&mut self) -> DriverResult<vk::DebugUtilsMessengerEXT> {
        let loader = self
            .debug_loader
            .as_ref()
            .ok_or(DriverError::NotReady("debug utils loader"))?;
        let info = messenger_create_info();
        Ok(unsafe { loader.create_debug_utils_messenger(&info, None)? })
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(loader) = &self.debug_loader {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn create_surface(&mut self, target: &dyn Presentable) -> DriverResult<vk::SurfaceKHR> {
        let display_raw = target.display_handle()?.as_raw();
        let window_raw = target.window_handle()?.as_raw();
        let instance = self.instance()?;
        Ok(unsafe { ash_window::create_surface(&self.entry, instance, display_raw, window_raw, None)? })
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = &self.surface_loader {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self) -> DriverResult<Vec<vk::PhysicalDevice>> {
        Ok(unsafe { self.instance()?.enumerate_physical_devices()? })
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        match self.instance() {
            Ok(instance) => {
                let props = unsafe { instance.get_physical_device_properties(device) };
                unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            }
            Err(_) => "<unknown>".to_owned(),
        }
    }

    fn queue_family_properties(&self, device: vk::PhysicalDevice) -> DriverResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe { self.instance()?.get_physical_device_queue_family_properties(device) })
    }

    fn surface_support(&self, device: vk::PhysicalDevice, family: u32, surface: vk::SurfaceKHR) -> DriverResult<bool> {
        Ok(unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(device, family, surface)?
        })
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> DriverResult<Vec<String>> {
        let props = unsafe { self.instance()?.enumerate_device_extension_properties(device)? };
        Ok(c_names(&props))
    }

    fn surface_capabilities(&self, device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> DriverResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(device, surface)?
        })
    }

    fn surface_formats(&self, device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> DriverResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(device, surface)?
        })
    }

    fn present_modes(&self, device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> DriverResult<Vec<vk::PresentModeKHR>> {
        Ok(unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(device, surface)?
        })
    }

    fn create_device(&mut self, device: vk::PhysicalDevice, families: &[u32], extensions: &[&CStr]) -> DriverResult<()> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let device_exts: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let instance = self.instance()?;
        let logical = unsafe { instance.create_device(device, &dinfo, None)? };
        self.swapchain_loader = Some(swapchain::Device::new(instance, &logical));
        self.device = Some(logical);
        Ok(())
    }

    fn device_queue(&self, family: u32) -> DriverResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(family, 0) })
    }

    fn destroy_device(&mut self) {
        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> DriverResult<vk::SwapchainKHR> {
        let families = [desc.queue_families.graphics, desc.queue_families.present];
        let (sharing_mode, family_count) = if desc.queue_families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0)
        } else {
            (vk::SharingMode::CONCURRENT, families.len() as u32)
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: desc.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: desc.pre_transform,
            composite_alpha: desc.composite_alpha,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };

        Ok(unsafe { self.swapchain_loader()?.create_swapchain(&swap_info, None)? })
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>> {
        Ok(unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain)? })
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain_loader {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> DriverResult<vk::ImageView> {
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping::default(),
            subresource_range: sub,
            ..Default::default()
        };
        Ok(unsafe { self.device()?.create_image_view(&iv_info, None)? })
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn wait_idle(&self) {
        if let Some(device) = &self.device {
            unsafe { device.device_wait_idle() }.ok();
        }
    }
}
