// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};
use std::ptr;

use ash::vk;
use tracing::{error, info, trace, warn};

use crate::loader::Loader;
use crate::VkError;

/// How a teardown call went. Callers can tell a clean release from one
/// that could not reach the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Teardown {
    /// Nothing was held.
    Idle,
    /// The handle was released and cleared.
    Destroyed,
    /// The destroy entry point was missing; the handle is still held.
    Unresolved,
}

unsafe extern "system" fn message_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

/// Driver-side diagnostics routed into `tracing`.
#[derive(Debug, Default)]
pub struct DebugMessenger {
    messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl DebugMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(message_callback))
    }

    pub fn is_installed(&self) -> bool {
        self.messenger.is_some()
    }

    pub fn handle(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.messenger
    }

    pub fn initialize(&mut self, loader: &Loader, instance: vk::Instance) -> Result<(), VkError> {
        if self.messenger.is_some() {
            return Ok(());
        }

        let create_fn = loader
            .load_fn::<vk::PFN_vkCreateDebugUtilsMessengerEXT>(instance)
            .inspect_err(|_| error!("Failed to load vkCreateDebugUtilsMessengerEXT function."))?;

        let info = Self::create_info();
        let mut messenger = vk::DebugUtilsMessengerEXT::null();
        let code = unsafe { create_fn(instance, &info, ptr::null(), &mut messenger) };
        if code != vk::Result::SUCCESS {
            error!("Failed to create debug utils messenger. Error: {code}");
            return Err(VkError::driver("vkCreateDebugUtilsMessengerEXT", code));
        }

        self.messenger = Some(messenger);
        Ok(())
    }

    pub fn shutdown(&mut self, loader: &Loader, instance: vk::Instance) -> Teardown {
        let Some(messenger) = self.messenger else {
            return Teardown::Idle;
        };

        let destroy_fn = match loader.load_fn::<vk::PFN_vkDestroyDebugUtilsMessengerEXT>(instance) {
            Ok(f) => f,
            Err(_) => {
                warn!("Failed to load vkDestroyDebugUtilsMessengerEXT function.");
                return Teardown::Unresolved;
            }
        };

        unsafe { destroy_fn(instance, messenger, ptr::null()) };
        self.messenger = None;
        Teardown::Destroyed
    }
}
