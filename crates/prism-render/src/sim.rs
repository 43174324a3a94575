// SPDX-License-Identifier: CEPL-1.0
//! In-memory driver for tests. Records every create/destroy call, tracks
//! which handles are alive and can be told to fail a given call.
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::CStr;
use std::rc::Rc;

use ash::vk::{self, Handle};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};

use crate::driver::{Driver, DriverError, DriverResult, InstanceDesc, SwapchainDesc};
use crate::window::{EventSource, Presentable};
use crate::RenderSize;

#[derive(Clone, Copy, Debug)]
pub(crate) struct SimFamily {
    pub graphics: bool,
    pub present: bool,
}

impl SimFamily {
    pub fn graphics_present() -> Self {
        SimFamily { graphics: true, present: true }
    }
    pub fn graphics() -> Self {
        SimFamily { graphics: true, present: false }
    }
    pub fn present() -> Self {
        SimFamily { graphics: false, present: true }
    }
    pub fn compute() -> Self {
        SimFamily { graphics: false, present: false }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SimDevice {
    pub name: String,
    pub families: Vec<SimFamily>,
    pub extensions: Vec<String>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub capabilities_fail: bool,
}

impl SimDevice {
    /// One combined graphics+present family, swapchain support, a surface
    /// that follows the window size.
    pub fn discrete(name: &str) -> Self {
        SimDevice {
            name: name.to_owned(),
            families: vec![SimFamily::graphics_present()],
            extensions: vec!["VK_KHR_swapchain".to_owned()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            capabilities_fail: false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SimLog {
    /// Create/destroy calls in the order they were made.
    pub calls: Vec<String>,
    /// Releases of objects that were not alive.
    pub double_frees: Vec<String>,
    /// Parents destroyed while children were still alive.
    pub order_violations: Vec<String>,
    pub swapchains: Vec<SwapchainDesc>,
    pub instance_desc: Option<(String, bool)>,
    pub wait_idles: usize,
}

impl SimLog {
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == name).count()
    }

    /// Calls with image view create/destroy entries collapsed, to make
    /// ordering assertions readable.
    pub fn lifecycle(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for call in &self.calls {
            if out.last() == Some(&call.as_str())
                && (call == "create_image_view" || call == "destroy_image_view")
            {
                continue;
            }
            out.push(call);
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Messenger,
    Surface,
    Swapchain,
    ImageView,
}

pub(crate) struct SimDriver {
    pub devices: Vec<SimDevice>,
    pub validation_available: bool,
    /// Fails the n-th (zero based) invocation of the named call.
    pub fail: Option<(&'static str, usize)>,
    log: Rc<RefCell<SimLog>>,
    invocations: RefCell<HashMap<&'static str, usize>>,
    live: HashMap<u64, Kind>,
    images: HashMap<u64, Vec<vk::Image>>,
    next_handle: u64,
    instance: bool,
    device: bool,
}

impl SimDriver {
    pub fn with_devices(devices: Vec<SimDevice>) -> Self {
        SimDriver {
            devices,
            validation_available: true,
            fail: None,
            log: Rc::new(RefCell::new(SimLog::default())),
            invocations: RefCell::new(HashMap::new()),
            live: HashMap::new(),
            images: HashMap::new(),
            next_handle: 1000,
            instance: false,
            device: false,
        }
    }

    pub fn failing(mut self, call: &'static str, nth: usize) -> Self {
        self.fail = Some((call, nth));
        self
    }

    /// Shared view of the call log; stays readable after the driver is
    /// dropped.
    pub fn log(&self) -> Rc<RefCell<SimLog>> {
        Rc::clone(&self.log)
    }

    fn check(&self, call: &'static str) -> DriverResult<()> {
        let mut invocations = self.invocations.borrow_mut();
        let n = invocations.entry(call).or_insert(0);
        let this = *n;
        *n += 1;
        match self.fail {
            Some((name, nth)) if name == call && nth == this => {
                Err(DriverError::Vk(vk::Result::ERROR_INITIALIZATION_FAILED))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().calls.push(call.to_owned());
    }

    fn alloc(&mut self, kind: Kind) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle, kind);
        self.next_handle
    }

    fn free(&mut self, raw: u64, kind: Kind, call: &str) {
        self.record(call);
        if self.live.get(&raw) == Some(&kind) {
            self.live.remove(&raw);
        } else {
            self.log.borrow_mut().double_frees.push(format!("{call}({raw})"));
        }
    }

    fn live_of(&self, kinds: &[Kind]) -> usize {
        self.live.values().filter(|k| kinds.contains(k)).count()
    }

    fn physical(&self, device: vk::PhysicalDevice) -> DriverResult<&SimDevice> {
        let raw = device.as_raw();
        if raw == 0 {
            return Err(DriverError::Vk(vk::Result::ERROR_DEVICE_LOST));
        }
        self.devices
            .get(raw as usize - 1)
            .ok_or(DriverError::Vk(vk::Result::ERROR_DEVICE_LOST))
    }
}

impl Driver for SimDriver {
    fn validation_supported(&self) -> DriverResult<bool> {
        Ok(self.validation_available)
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>, _target: &dyn Presentable) -> DriverResult<()> {
        self.check("create_instance")?;
        self.record("create_instance");
        self.instance = true;
        self.log.borrow_mut().instance_desc = Some((desc.app_name.to_owned(), desc.enable_validation));
        Ok(())
    }

    fn destroy_instance(&mut self) {
        self.record("destroy_instance");
        if !self.instance {
            self.log.borrow_mut().double_frees.push("destroy_instance".to_owned());
        }
        if self.device || !self.live.is_empty() {
            self.log
                .borrow_mut()
                .order_violations
                .push("instance destroyed with live children".to_owned());
        }
        self.instance = false;
    }

    fn create_debug_messenger(&mut self) -> DriverResult<vk::DebugUtilsMessengerEXT> {
        self.check("create_debug_messenger")?;
        if !self.instance {
            return Err(DriverError::NotReady("instance"));
        }
        self.record("create_debug_messenger");
        Ok(vk::DebugUtilsMessengerEXT::from_raw(self.alloc(Kind::Messenger)))
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        self.free(messenger.as_raw(), Kind::Messenger, "destroy_debug_messenger");
    }

    fn create_surface(&mut self, _target: &dyn Presentable) -> DriverResult<vk::SurfaceKHR> {
        self.check("create_surface")?;
        if !self.instance {
            return Err(DriverError::NotReady("instance"));
        }
        self.record("create_surface");
        Ok(vk::SurfaceKHR::from_raw(self.alloc(Kind::Surface)))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if self.live_of(&[Kind::Swapchain]) > 0 {
            self.log
                .borrow_mut()
                .order_violations
                .push("surface destroyed with live swapchain".to_owned());
        }
        self.free(surface.as_raw(), Kind::Surface, "destroy_surface");
    }

    fn enumerate_physical_devices(&self) -> DriverResult<Vec<vk::PhysicalDevice>> {
        self.check("enumerate_physical_devices")?;
        if !self.instance {
            return Err(DriverError::NotReady("instance"));
        }
        Ok((1..=self.devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        self.physical(device)
            .map(|d| d.name.clone())
            .unwrap_or_else(|_| "<unknown>".to_owned())
    }

    fn queue_family_properties(&self, device: vk::PhysicalDevice) -> DriverResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .physical(device)?
            .families
            .iter()
            .map(|f| vk::QueueFamilyProperties {
                queue_flags: if f.graphics {
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE
                } else {
                    vk::QueueFlags::COMPUTE
                },
                queue_count: 1,
                ..Default::default()
            })
            .collect())
    }

    fn surface_support(&self, device: vk::PhysicalDevice, family: u32, _surface: vk::SurfaceKHR) -> DriverResult<bool> {
        Ok(self
            .physical(device)?
            .families
            .get(family as usize)
            .is_some_and(|f| f.present))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> DriverResult<Vec<String>> {
        Ok(self.physical(device)?.extensions.clone())
    }

    fn surface_capabilities(&self, device: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> DriverResult<vk::SurfaceCapabilitiesKHR> {
        let dev = self.physical(device)?;
        if dev.capabilities_fail {
            return Err(DriverError::Vk(vk::Result::ERROR_SURFACE_LOST_KHR));
        }
        Ok(dev.capabilities)
    }

    fn surface_formats(&self, device: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> DriverResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.physical(device)?.formats.clone())
    }

    fn present_modes(&self, device: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> DriverResult<Vec<vk::PresentModeKHR>> {
        Ok(self.physical(device)?.present_modes.clone())
    }

    fn create_device(&mut self, device: vk::PhysicalDevice, families: &[u32], extensions: &[&CStr]) -> DriverResult<()> {
        self.check("create_device")?;
        self.physical(device)?;
        if !self.instance {
            return Err(DriverError::NotReady("instance"));
        }
        assert!(!families.is_empty());
        assert!(!extensions.is_empty());
        self.record("create_device");
        self.device = true;
        Ok(())
    }

    fn device_queue(&self, family: u32) -> DriverResult<vk::Queue> {
        self.check("device_queue")?;
        if !self.device {
            return Err(DriverError::NotReady("logical device"));
        }
        Ok(vk::Queue::from_raw(500 + u64::from(family)))
    }

    fn destroy_device(&mut self) {
        self.record("destroy_device");
        if !self.device {
            self.log.borrow_mut().double_frees.push("destroy_device".to_owned());
        }
        if self.live_of(&[Kind::Swapchain, Kind::ImageView]) > 0 {
            self.log
                .borrow_mut()
                .order_violations
                .push("device destroyed with live swapchain objects".to_owned());
        }
        self.device = false;
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> DriverResult<vk::SwapchainKHR> {
        self.check("create_swapchain")?;
        if !self.device {
            return Err(DriverError::NotReady("logical device"));
        }
        self.record("create_swapchain");
        self.log.borrow_mut().swapchains.push(*desc);

        let raw = self.alloc(Kind::Swapchain);
        let images = (0..u64::from(desc.min_image_count))
            .map(|i| vk::Image::from_raw(raw * 100 + i))
            .collect();
        self.images.insert(raw, images);
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>> {
        self.check("swapchain_images")?;
        self.images
            .get(&swapchain.as_raw())
            .cloned()
            .ok_or(DriverError::NotReady("swapchain"))
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if self.live_of(&[Kind::ImageView]) > 0 {
            self.log
                .borrow_mut()
                .order_violations
                .push("swapchain destroyed with live image views".to_owned());
        }
        self.images.remove(&swapchain.as_raw());
        self.free(swapchain.as_raw(), Kind::Swapchain, "destroy_swapchain");
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> DriverResult<vk::ImageView> {
        self.check("create_image_view")?;
        if !self.device {
            return Err(DriverError::NotReady("logical device"));
        }
        self.record("create_image_view");
        Ok(vk::ImageView::from_raw(self.alloc(Kind::ImageView)))
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.free(view.as_raw(), Kind::ImageView, "destroy_image_view");
    }

    fn wait_idle(&self) {
        self.log.borrow_mut().wait_idles += 1;
    }
}

/// A window with no native handles; only the sim driver may be used with it.
pub(crate) struct SimWindow {
    pub size: RenderSize,
}

impl HasWindowHandle for SimWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl HasDisplayHandle for SimWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl Presentable for SimWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.size
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum SimEvent {
    Idle,
    Resize(RenderSize),
    Close,
}

/// Replays one scripted event per poll; closes once the script runs out.
pub(crate) struct ScriptedEvents {
    script: VecDeque<SimEvent>,
    closing: bool,
    resize: Option<RenderSize>,
    pub polls: usize,
}

impl ScriptedEvents {
    pub fn new(script: impl IntoIterator<Item = SimEvent>) -> Self {
        ScriptedEvents {
            script: script.into_iter().collect(),
            closing: false,
            resize: None,
            polls: 0,
        }
    }
}

impl EventSource for ScriptedEvents {
    fn poll_events(&mut self) {
        self.polls += 1;
        match self.script.pop_front() {
            Some(SimEvent::Idle) => {}
            Some(SimEvent::Resize(size)) => self.resize = Some(size),
            Some(SimEvent::Close) | None => self.closing = true,
        }
    }

    fn should_close(&self) -> bool {
        self.closing
    }

    fn take_resize(&mut self) -> Option<RenderSize> {
        self.resize.take()
    }
}
