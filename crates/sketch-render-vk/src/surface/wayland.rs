// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::ptr;

use ash::{khr, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use sketch_render::NativeWindow;
use tracing::error;

use super::{
    create_with, mismatch, raw_handles, wrong_handles, NativeHandles, SurfaceBackend,
    SurfaceProvider,
};
use crate::loader::Loader;
use crate::VkError;

pub struct WaylandSurfaceProvider;

impl SurfaceProvider for WaylandSurfaceProvider {
    fn backend(&self) -> SurfaceBackend {
        SurfaceBackend::Wayland
    }

    fn extension(&self) -> &'static CStr {
        khr::wayland_surface::NAME
    }

    fn native_handles(&self, window: &dyn NativeWindow) -> Result<NativeHandles, VkError> {
        match raw_handles(window)? {
            (RawDisplayHandle::Wayland(d), RawWindowHandle::Wayland(w)) => {
                Ok(NativeHandles::Wayland {
                    display: d.display.as_ptr(),
                    surface: w.surface.as_ptr(),
                })
            }
            (d, w) => Err(mismatch(self.backend(), d, w)),
        }
    }

    fn create(
        &self,
        loader: &Loader,
        instance: vk::Instance,
        handles: &NativeHandles,
    ) -> Result<vk::SurfaceKHR, VkError> {
        let NativeHandles::Wayland { display, surface } = *handles else {
            return Err(wrong_handles(self.backend(), handles));
        };

        let create_fn = loader
            .load_fn::<vk::PFN_vkCreateWaylandSurfaceKHR>(instance)
            .inspect_err(|_| error!("Failed to load vkCreateWaylandSurfaceKHR function."))?;

        let info = vk::WaylandSurfaceCreateInfoKHR::default()
            .display(display.cast())
            .surface(surface.cast());
        create_with("vkCreateWaylandSurfaceKHR", |out| unsafe {
            create_fn(instance, &info, ptr::null(), out)
        })
    }
}
