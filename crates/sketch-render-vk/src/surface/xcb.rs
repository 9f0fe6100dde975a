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

pub struct XcbSurfaceProvider;

impl SurfaceProvider for XcbSurfaceProvider {
    fn backend(&self) -> SurfaceBackend {
        SurfaceBackend::Xcb
    }

    fn extension(&self) -> &'static CStr {
        khr::xcb_surface::NAME
    }

    fn native_handles(&self, window: &dyn NativeWindow) -> Result<NativeHandles, VkError> {
        match raw_handles(window)? {
            (RawDisplayHandle::Xcb(d), RawWindowHandle::Xcb(w)) => {
                let connection = d
                    .connection
                    .ok_or_else(|| VkError::Window("XCB connection is not open".into()))?;
                Ok(NativeHandles::Xcb {
                    connection: connection.as_ptr(),
                    window: w.window.get(),
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
        let NativeHandles::Xcb { connection, window } = *handles else {
            return Err(wrong_handles(self.backend(), handles));
        };

        let create_fn = loader
            .load_fn::<vk::PFN_vkCreateXcbSurfaceKHR>(instance)
            .inspect_err(|_| error!("Failed to load vkCreateXcbSurfaceKHR function."))?;

        let info = vk::XcbSurfaceCreateInfoKHR::default()
            .connection(connection.cast())
            .window(window);
        create_with("vkCreateXcbSurfaceKHR", |surface| unsafe {
            create_fn(instance, &info, ptr::null(), surface)
        })
    }
}
