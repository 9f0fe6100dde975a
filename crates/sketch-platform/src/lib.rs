// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use sketch_render::{NativeWindow, RenderSize};
use winit::raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use winit::window::{Window, WindowId};

/// A winit window handed to render backends.
pub struct PlatformWindow {
    window: Window,
}

impl PlatformWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl NativeWindow for PlatformWindow {
    fn pixel_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize::new(size.width, size.height)
    }
}
