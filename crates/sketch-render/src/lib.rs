// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A platform window as seen by a render backend: raw native handles plus
/// its drawable size in pixels. The backend never creates or owns windows.
pub trait NativeWindow: HasWindowHandle + HasDisplayHandle {
    fn pixel_size(&self) -> RenderSize;
}

/// What an API backend knows about the driver it is talking to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub api: String,
    pub version: String,
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
}

pub trait Renderer {
    /// Connects to the driver. Leaves the renderer unusable on error.
    fn initialize(&mut self) -> Result<()>;

    /// Prepares per-window state for `window`.
    fn initialize_window(&mut self, window: &dyn NativeWindow) -> Result<()>;

    /// Releases everything. Safe to call more than once.
    fn shutdown(&mut self);

    fn is_ready(&self) -> bool;
    fn summary(&self) -> &DriverSummary;
}
