// SPDX-License-Identifier: CEPL-1.0
//! Desktop window for a [`prism_render::Session`], driven by winit in
//! pump-events mode so the session owns the main loop.
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use prism_render::{EventSource, Presentable, RenderSize};
use tracing::{error, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window, WindowAttributes, WindowId},
};

/// Pumps allowed while waiting for the platform to deliver `resumed`.
const OPEN_ATTEMPTS: u32 = 200;
const OPEN_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// Window state shared with winit's callbacks.
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Window>,
    create_error: Option<String>,
    close_requested: bool,
    pending_resize: Option<RenderSize>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                let size = window.inner_size();
                info!(
                    "window created ({}x{} px, scale {:.2})",
                    size.width,
                    size.height,
                    window.scale_factor()
                );
                self.window = Some(window);
            }
            Err(e) => {
                error!("create_window: {e}");
                self.create_error = Some(e.to_string());
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                self.pending_resize = Some(RenderSize::new(new_size.width, new_size.height));
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                // A Resized event carrying the new physical size follows.
            }
            _ => {}
        }
    }
}

/// A desktop window plus the event loop that feeds it.
///
/// Dropping it destroys the window; shut the session down first.
pub struct DesktopWindow {
    // Field order: the window must be dropped before its event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl DesktopWindow {
    /// Opens a window of `width` x `height` logical pixels. Blocks until the
    /// platform has created it.
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height));

        let mut this = DesktopWindow {
            state: WindowState {
                attributes,
                window: None,
                create_error: None,
                close_requested: false,
                pending_resize: None,
            },
            event_loop,
        };

        for _ in 0..OPEN_ATTEMPTS {
            let status = this
                .event_loop
                .pump_app_events(Some(OPEN_PUMP_TIMEOUT), &mut this.state);
            if let Some(e) = this.state.create_error.take() {
                bail!("failed to create window: {e}");
            }
            if this.state.window.is_some() {
                // The initial size is reported through framebuffer_size().
                this.state.pending_resize = None;
                return Ok(this);
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with code {code} before the window was created");
            }
        }
        Err(anyhow!("window system never resumed the application"))
    }

    fn window(&self) -> Result<&Window, HandleError> {
        self.state.window.as_ref().ok_or(HandleError::Unavailable)
    }
}

impl HasWindowHandle for DesktopWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window()?.window_handle()
    }
}

impl HasDisplayHandle for DesktopWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window()?.display_handle()
    }
}

impl Presentable for DesktopWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.state
            .window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                RenderSize::new(size.width, size.height)
            })
            .unwrap_or(RenderSize::new(0, 0))
    }
}

impl EventSource for DesktopWindow {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            info!("event loop exited ({code})");
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn take_resize(&mut self) -> Option<RenderSize> {
        self.state.pending_resize.take()
    }
}
