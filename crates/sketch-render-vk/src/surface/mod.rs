// SPDX-License-Identifier: CEPL-1.0
//! Presentable surfaces bound to native windows.
//!
//! One [`SurfaceProvider`] exists per windowing backend. The provider used
//! for a window is picked at startup ([`provider_for`]), either from
//! configuration or from the kind of handle the window hands out.

mod wayland;
mod xcb;
mod xlib;

pub use wayland::WaylandSurfaceProvider;
pub use xcb::XcbSurfaceProvider;
pub use xlib::XlibSurfaceProvider;

use std::ffi::{c_ulong, c_void, CStr};
use std::fmt;
use std::ptr;
use std::str::FromStr;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use sketch_render::{NativeWindow, RenderSize};
use tracing::{error, info, warn};

use crate::debug::Teardown;
use crate::loader::Loader;
use crate::VkError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SurfaceBackend {
    /// Follow whatever handle kind the window provides.
    #[default]
    Auto,
    Xlib,
    Xcb,
    Wayland,
}

impl SurfaceBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Xlib => "xlib",
            Self::Xcb => "xcb",
            Self::Wayland => "wayland",
        }
    }
}

impl fmt::Display for SurfaceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SurfaceBackend {
    type Err = VkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "xlib" | "x11" => Ok(Self::Xlib),
            "xcb" => Ok(Self::Xcb),
            "wayland" => Ok(Self::Wayland),
            other => Err(VkError::Config(format!("unknown surface backend `{other}`"))),
        }
    }
}

/// Native identifiers a provider extracted from a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeHandles {
    Xlib {
        display: *mut c_void,
        window: c_ulong,
    },
    Xcb {
        connection: *mut c_void,
        window: u32,
    },
    Wayland {
        display: *mut c_void,
        surface: *mut c_void,
    },
}

pub trait SurfaceProvider {
    fn backend(&self) -> SurfaceBackend;

    /// Instance extension the driver needs for this backend.
    fn extension(&self) -> &'static CStr;

    /// Pulls this backend's identifiers out of `window`. Never touches the
    /// driver.
    fn native_handles(&self, window: &dyn NativeWindow) -> Result<NativeHandles, VkError>;

    fn create(
        &self,
        loader: &Loader,
        instance: vk::Instance,
        handles: &NativeHandles,
    ) -> Result<vk::SurfaceKHR, VkError>;
}

pub(crate) fn raw_handles(
    window: &dyn NativeWindow,
) -> Result<(RawDisplayHandle, RawWindowHandle), VkError> {
    let display = window
        .display_handle()
        .map_err(|e| VkError::Window(e.to_string()))?
        .as_raw();
    let window = window
        .window_handle()
        .map_err(|e| VkError::Window(e.to_string()))?
        .as_raw();
    Ok((display, window))
}

pub(crate) fn mismatch(
    backend: SurfaceBackend,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> VkError {
    VkError::Window(format!(
        "{backend} surface cannot use window {window:?} on display {display:?}"
    ))
}

pub(crate) fn wrong_handles(backend: SurfaceBackend, handles: &NativeHandles) -> VkError {
    VkError::Window(format!("{backend} surface was given {handles:?}"))
}

/// Runs a driver `vkCreate*SurfaceKHR` call and checks its status.
pub(crate) fn create_with(
    call: &'static str,
    create: impl FnOnce(*mut vk::SurfaceKHR) -> vk::Result,
) -> Result<vk::SurfaceKHR, VkError> {
    let mut surface = vk::SurfaceKHR::null();
    let code = create(&mut surface);
    if code != vk::Result::SUCCESS {
        error!("{call} failed. Error: {code}");
        return Err(VkError::driver(call, code));
    }
    Ok(surface)
}

/// Picks the provider for `backend`. `Auto` goes by the window's handle.
pub fn provider_for(
    backend: SurfaceBackend,
    window: &dyn NativeWindow,
) -> Result<Box<dyn SurfaceProvider>, VkError> {
    let backend = match backend {
        SurfaceBackend::Auto => match raw_handles(window)?.1 {
            RawWindowHandle::Xlib(_) => SurfaceBackend::Xlib,
            RawWindowHandle::Xcb(_) => SurfaceBackend::Xcb,
            RawWindowHandle::Wayland(_) => SurfaceBackend::Wayland,
            other => {
                return Err(VkError::Window(format!(
                    "no surface backend for window {other:?}"
                )))
            }
        },
        chosen => chosen,
    };

    Ok(match backend {
        SurfaceBackend::Xlib | SurfaceBackend::Auto => Box::new(XlibSurfaceProvider),
        SurfaceBackend::Xcb => Box::new(XcbSurfaceProvider),
        SurfaceBackend::Wayland => Box::new(WaylandSurfaceProvider),
    })
}

/// A driver surface for one window, plus the resolution it was made at.
pub struct Surface {
    provider: Box<dyn SurfaceProvider>,
    handle: Option<vk::SurfaceKHR>,
    resolution: RenderSize,
}

impl Surface {
    pub fn new(provider: Box<dyn SurfaceProvider>) -> Self {
        Self {
            provider,
            handle: None,
            resolution: RenderSize::default(),
        }
    }

    pub fn backend(&self) -> SurfaceBackend {
        self.provider.backend()
    }

    pub fn initialize(
        &mut self,
        loader: &Loader,
        instance: vk::Instance,
        window: &dyn NativeWindow,
    ) -> Result<(), VkError> {
        if self.handle.is_some() {
            return Ok(());
        }

        let handles = self.provider.native_handles(window).inspect_err(|e| {
            error!("Failed to retrieve native window information. Error: {e}");
        })?;
        self.resolution = window.pixel_size();

        let surface = self.provider.create(loader, instance, &handles)?;
        info!(
            "Created {} surface ({}x{})",
            self.backend(),
            self.resolution.width,
            self.resolution.height
        );
        self.handle = Some(surface);
        Ok(())
    }

    pub fn shutdown(&mut self, loader: &Loader, instance: vk::Instance) -> Teardown {
        let Some(surface) = self.handle.take() else {
            return Teardown::Idle;
        };

        match loader.load_fn::<vk::PFN_vkDestroySurfaceKHR>(instance) {
            Ok(destroy_fn) => {
                unsafe { destroy_fn(instance, surface, ptr::null()) };
                Teardown::Destroyed
            }
            Err(_) => {
                warn!("Failed to load vkDestroySurfaceKHR function.");
                self.handle = Some(surface);
                Teardown::Unresolved
            }
        }
    }

    pub fn get(&self) -> Option<vk::SurfaceKHR> {
        self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    pub fn resolution(&self) -> RenderSize {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: RenderSize) {
        self.resolution = resolution;
    }
}
