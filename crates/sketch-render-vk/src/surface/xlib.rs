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

pub struct XlibSurfaceProvider;

impl SurfaceProvider for XlibSurfaceProvider {
    fn backend(&self) -> SurfaceBackend {
        SurfaceBackend::Xlib
    }

    fn extension(&self) -> &'static CStr {
        khr::xlib_surface::NAME
    }

    fn native_handles(&self, window: &dyn NativeWindow) -> Result<NativeHandles, VkError> {
        match raw_handles(window)? {
            (RawDisplayHandle::Xlib(d), RawWindowHandle::Xlib(w)) => {
                let display = d
                    .display
                    .ok_or_else(|| VkError::Window("Xlib display is not connected".into()))?;
                Ok(NativeHandles::Xlib {
                    display: display.as_ptr(),
                    window: w.window,
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
        let NativeHandles::Xlib { display, window } = *handles else {
            return Err(wrong_handles(self.backend(), handles));
        };

        let create_fn = loader
            .load_fn::<vk::PFN_vkCreateXlibSurfaceKHR>(instance)
            .inspect_err(|_| error!("Failed to load vkCreateXlibSurfaceKHR function."))?;

        let info = vk::XlibSurfaceCreateInfoKHR::default()
            .dpy(display.cast())
            .window(window);
        create_with("vkCreateXlibSurfaceKHR", |surface| unsafe {
            create_fn(instance, &info, ptr::null(), surface)
        })
    }
}
