// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::RenderSize;

/// A window a presentation surface can be created for.
pub trait Presentable: HasWindowHandle + HasDisplayHandle {
    /// Size of the drawable area in physical pixels. May differ from the
    /// logical window size on scaled displays.
    fn framebuffer_size(&self) -> RenderSize;
}

/// The event side of the window system, polled by the session's run loop.
pub trait EventSource {
    /// Drains pending window events and returns.
    fn poll_events(&mut self);

    fn should_close(&self) -> bool;

    /// Latest framebuffer size reported since the previous call, if any.
    fn take_resize(&mut self) -> Option<RenderSize>;
}
