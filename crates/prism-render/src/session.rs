// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use prism_core::FrameClock;
use tracing::{debug, info};

use crate::driver::{Driver, DriverError, InstanceDesc, SwapchainDesc};
use crate::error::BootError;
use crate::negotiate::{
    choose_composite_alpha, choose_extent, choose_image_count, choose_present_mode_with,
    choose_surface_format, format_name, present_mode_name, VsyncMode,
};
use crate::selector::{pick_physical_device, SelectedDevice, REQUIRED_DEVICE_EXTENSIONS};
use crate::surface::query_capabilities;
use crate::window::{EventSource, Presentable};
use crate::RenderSize;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub app_name: String,
    pub engine_name: String,
    /// Enables the validation layer and the debug messenger that reports
    /// through it.
    pub enable_validation: bool,
    pub vsync_mode: VsyncMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            app_name: "Prism".to_owned(),
            engine_name: "Prism".to_owned(),
            enable_validation: cfg!(debug_assertions),
            vsync_mode: VsyncMode::default(),
        }
    }
}

/// Lifecycle of a session. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Uninitialized,
    ContextCreated,
    DebugChannelCreated,
    SurfaceCreated,
    DeviceSelected,
    LogicalDeviceCreated,
    PipelineCreated,
    ImageViewsCreated,
    Running,
    Terminated,
}

/// The swapchain and everything negotiated for it. Views are created and
/// destroyed together with the swapchain.
#[derive(Clone, Debug)]
pub struct PresentationPipeline {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

impl PresentationPipeline {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// One acquired driver object, released by popping it off the stack.
#[derive(Debug)]
enum Resource {
    Instance,
    DebugMessenger(vk::DebugUtilsMessengerEXT),
    Surface(vk::SurfaceKHR),
    Device,
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
}

/// Owns every driver object of a running graphics session.
///
/// Objects are acquired strictly in phase order and pushed onto a resource
/// stack. Shutdown pops the stack, so release always runs in reverse creation
/// order and only covers what was actually created, including after a setup
/// failure part-way through.
pub struct Session<D: Driver> {
    driver: D,
    config: SessionConfig,
    phase: SessionPhase,
    resources: Vec<Resource>,

    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: vk::SurfaceKHR,
    device: Option<SelectedDevice>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    pipeline: Option<PresentationPipeline>,
    paused: bool,
}

impl<D: Driver> Session<D> {
    /// Runs the full setup sequence against `target`. On failure everything
    /// created so far has already been released when the error is returned.
    pub fn start(driver: D, target: &dyn Presentable, config: SessionConfig) -> Result<Self, BootError> {
        let mut session = Session {
            driver,
            config,
            phase: SessionPhase::Uninitialized,
            resources: Vec::new(),
            debug_messenger: None,
            surface: vk::SurfaceKHR::null(),
            device: None,
            graphics_queue: vk::Queue::null(),
            present_queue: vk::Queue::null(),
            pipeline: None,
            paused: false,
        };
        // Dropping `session` on error unwinds the resource stack.
        session.setup(target)?;
        Ok(session)
    }

    fn setup(&mut self, target: &dyn Presentable) -> Result<(), BootError> {
        // STRICT ORDER: instance -> (debug) -> surface -> physical device ->
        // logical device -> swapchain -> image views. Every step relies on
        // the ones before it.
        if self.config.enable_validation {
            let available = self
                .driver
                .validation_supported()
                .map_err(BootError::ContextCreationFailed)?;
            if !available {
                return Err(BootError::ValidationLayerUnavailable);
            }
        }

        let desc = InstanceDesc {
            app_name: &self.config.app_name,
            engine_name: &self.config.engine_name,
            enable_validation: self.config.enable_validation,
        };
        self.driver
            .create_instance(&desc, target)
            .map_err(BootError::ContextCreationFailed)?;
        self.resources.push(Resource::Instance);
        self.advance(SessionPhase::ContextCreated);

        if self.config.enable_validation {
            let messenger = self
                .driver
                .create_debug_messenger()
                .map_err(BootError::DebugChannelCreationFailed)?;
            self.resources.push(Resource::DebugMessenger(messenger));
            self.debug_messenger = Some(messenger);
            self.advance(SessionPhase::DebugChannelCreated);
        }

        let surface = self
            .driver
            .create_surface(target)
            .map_err(BootError::SurfaceCreationFailed)?;
        self.resources.push(Resource::Surface(surface));
        self.surface = surface;
        self.advance(SessionPhase::SurfaceCreated);

        let selected = pick_physical_device(&self.driver, surface)?;
        self.advance(SessionPhase::DeviceSelected);

        let families = selected.queue_families;
        self.driver
            .create_device(selected.device, &families.unique(), REQUIRED_DEVICE_EXTENSIONS)
            .map_err(BootError::DeviceCreationFailed)?;
        self.resources.push(Resource::Device);
        self.graphics_queue = self
            .driver
            .device_queue(families.graphics)
            .map_err(BootError::DeviceCreationFailed)?;
        self.present_queue = self
            .driver
            .device_queue(families.present)
            .map_err(BootError::DeviceCreationFailed)?;
        self.device = Some(selected);
        self.advance(SessionPhase::LogicalDeviceCreated);

        let size = target.framebuffer_size();
        if size.is_empty() {
            // Minimised at startup: the first non-empty resize builds the
            // swapchain.
            info!("framebuffer is empty, deferring swapchain");
            self.paused = true;
            return Ok(());
        }
        self.build_pipeline(size)
    }

    /// Negotiates and creates the swapchain for `framebuffer`, then one view
    /// per swapchain image. Capabilities are queried fresh every time.
    fn build_pipeline(&mut self, framebuffer: RenderSize) -> Result<(), BootError> {
        let Some(selected) = self.device.as_ref() else {
            return Err(BootError::PipelineCreationFailed(DriverError::NotReady(
                "logical device",
            )));
        };
        let (physical, families) = (selected.device, selected.queue_families);

        let support = query_capabilities(&self.driver, physical, self.surface)
            .map_err(BootError::PipelineCreationFailed)?;
        if !support.is_adequate() {
            return Err(BootError::PipelineCreationFailed(DriverError::Vk(
                vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            )));
        }
        let caps = &support.capabilities;

        let format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode_with(&support.present_modes, self.config.vsync_mode);
        let extent = choose_extent(caps, framebuffer);

        let desc = SwapchainDesc {
            surface: self.surface,
            min_image_count: choose_image_count(caps),
            format,
            extent,
            present_mode,
            pre_transform: caps.current_transform,
            composite_alpha: choose_composite_alpha(caps),
            queue_families: families,
        };
        let swapchain = self
            .driver
            .create_swapchain(&desc)
            .map_err(BootError::PipelineCreationFailed)?;
        self.resources.push(Resource::Swapchain(swapchain));
        self.advance(SessionPhase::PipelineCreated);

        let images = self
            .driver
            .swapchain_images(swapchain)
            .map_err(BootError::PipelineCreationFailed)?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view = self
                .driver
                .create_image_view(image, format.format)
                .map_err(BootError::ImageViewCreationFailed)?;
            self.resources.push(Resource::ImageView(view));
            image_views.push(view);
        }
        self.advance(SessionPhase::ImageViewsCreated);

        info!(
            "swapchain ready ({}x{}, {} images, {}, {})",
            extent.width,
            extent.height,
            images.len(),
            format_name(format.format),
            present_mode_name(present_mode)
        );
        self.pipeline = Some(PresentationPipeline {
            swapchain,
            format,
            present_mode,
            extent,
            images,
            image_views,
        });
        Ok(())
    }

    /// Releases the image views and the swapchain, which sit on top of the
    /// resource stack.
    fn release_pipeline(&mut self) {
        while matches!(
            self.resources.last(),
            Some(Resource::ImageView(_) | Resource::Swapchain(_))
        ) {
            if let Some(resource) = self.resources.pop() {
                self.release(resource);
            }
        }
        self.pipeline = None;
    }

    /// Rebuilds the presentation pipeline for a new framebuffer size. A
    /// zero-area size (minimised window) pauses instead.
    pub fn resize(&mut self, size: RenderSize) -> Result<(), BootError> {
        if self.device.is_none() {
            return Ok(());
        }
        if size.is_empty() {
            if !self.paused {
                info!("framebuffer is empty, pausing");
            }
            self.paused = true;
            return Ok(());
        }

        debug!("recreating swapchain for {}x{}", size.width, size.height);
        self.paused = false;
        self.driver.wait_idle();
        self.release_pipeline();
        self.build_pipeline(size)
    }

    /// Polls `events` until the window asks to close.
    pub fn run(&mut self, events: &mut dyn EventSource) -> Result<(), BootError> {
        if self.phase == SessionPhase::Terminated {
            return Ok(());
        }
        self.advance(SessionPhase::Running);
        info!("running");

        let mut clock = FrameClock::new();
        loop {
            events.poll_events();
            if events.should_close() {
                info!("close requested");
                return Ok(());
            }
            if let Some(size) = events.take_resize() {
                self.resize(size)?;
            }
            if !self.paused {
                clock.tick();
            }
        }
    }

    /// Releases every driver object in reverse creation order. Calling it
    /// again is a no-op.
    pub fn shutdown(&mut self) {
        if self.resources.is_empty() {
            self.phase = SessionPhase::Terminated;
            return;
        }

        if self.device.is_some() {
            self.driver.wait_idle();
        }
        while let Some(resource) = self.resources.pop() {
            self.release(resource);
        }
        self.pipeline = None;
        self.phase = SessionPhase::Terminated;
        info!("session terminated");
    }

    fn release(&mut self, resource: Resource) {
        debug!("releasing {:?}", resource);
        match resource {
            Resource::ImageView(view) => self.driver.destroy_image_view(view),
            Resource::Swapchain(swapchain) => self.driver.destroy_swapchain(swapchain),
            Resource::Device => {
                self.driver.destroy_device();
                self.device = None;
                self.graphics_queue = vk::Queue::null();
                self.present_queue = vk::Queue::null();
            }
            Resource::Surface(surface) => {
                self.driver.destroy_surface(surface);
                self.surface = vk::SurfaceKHR::null();
            }
            Resource::DebugMessenger(messenger) => {
                self.driver.destroy_debug_messenger(messenger);
                self.debug_messenger = None;
            }
            Resource::Instance => self.driver.destroy_instance(),
        }
    }

    fn advance(&mut self, next: SessionPhase) {
        if next > self.phase {
            debug!("{:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn selected_device(&self) -> Option<&SelectedDevice> {
        self.device.as_ref()
    }

    pub fn pipeline(&self) -> Option<&PresentationPipeline> {
        self.pipeline.as_ref()
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn debug_messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.debug_messenger
    }

    /// Graphics and present queues; the same handle when the families match.
    pub fn queues(&self) -> (vk::Queue, vk::Queue) {
        (self.graphics_queue, self.present_queue)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
