// SPDX-License-Identifier: CEPL-1.0
//! Typed lookup of driver entry points.
//!
//! Every function the backend resolves by name is listed once in
//! [`EntryPoint`]. Lookups hand back the concrete `PFN_*` type chosen by the
//! caller or [`VkError::Unsupported`], never a null pointer.

use std::collections::HashMap;
use std::ffi::CStr;

use ash::{vk, Entry};

use crate::VkError;

pub type RawFn = unsafe extern "system" fn();

/// Which instance handle a lookup must be scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Resolved with a null instance.
    Global,
    /// Resolved against a live instance.
    Instance,
}

/// Function pointer types that stand for exactly one [`EntryPoint`].
///
/// # Safety
/// `from_raw` must only be given a pointer the driver returned for
/// `Self::ENTRY`'s name; implementors must have the matching signature.
pub unsafe trait EntryPointFn: Copy {
    const ENTRY: EntryPoint;

    /// # Safety
    /// See the trait documentation.
    unsafe fn from_raw(raw: RawFn) -> Self;
}

macro_rules! entry_points {
    ($($variant:ident: $pfn:ty = $name:expr, $scope:ident;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum EntryPoint {
            $($variant,)*
        }

        impl EntryPoint {
            pub const ALL: &'static [EntryPoint] = &[$(EntryPoint::$variant,)*];

            pub fn name(self) -> &'static CStr {
                match self {
                    $(EntryPoint::$variant => $name,)*
                }
            }

            pub fn scope(self) -> Scope {
                match self {
                    $(EntryPoint::$variant => Scope::$scope,)*
                }
            }
        }

        $(
            unsafe impl EntryPointFn for $pfn {
                const ENTRY: EntryPoint = EntryPoint::$variant;

                unsafe fn from_raw(raw: RawFn) -> Self {
                    unsafe { std::mem::transmute::<RawFn, $pfn>(raw) }
                }
            }
        )*
    };
}

entry_points! {
    EnumerateInstanceExtensionProperties: vk::PFN_vkEnumerateInstanceExtensionProperties =
        c"vkEnumerateInstanceExtensionProperties", Global;
    EnumerateInstanceLayerProperties: vk::PFN_vkEnumerateInstanceLayerProperties =
        c"vkEnumerateInstanceLayerProperties", Global;
    EnumerateInstanceVersion: vk::PFN_vkEnumerateInstanceVersion =
        c"vkEnumerateInstanceVersion", Global;
    CreateDebugUtilsMessenger: vk::PFN_vkCreateDebugUtilsMessengerEXT =
        c"vkCreateDebugUtilsMessengerEXT", Instance;
    DestroyDebugUtilsMessenger: vk::PFN_vkDestroyDebugUtilsMessengerEXT =
        c"vkDestroyDebugUtilsMessengerEXT", Instance;
    CreateXlibSurface: vk::PFN_vkCreateXlibSurfaceKHR = c"vkCreateXlibSurfaceKHR", Instance;
    CreateXcbSurface: vk::PFN_vkCreateXcbSurfaceKHR = c"vkCreateXcbSurfaceKHR", Instance;
    CreateWaylandSurface: vk::PFN_vkCreateWaylandSurfaceKHR =
        c"vkCreateWaylandSurfaceKHR", Instance;
    DestroySurface: vk::PFN_vkDestroySurfaceKHR = c"vkDestroySurfaceKHR", Instance;
}

impl EntryPoint {
    /// Name as text, for logs and errors.
    pub fn label(self) -> &'static str {
        self.name().to_str().unwrap_or("<non-utf8 entry point>")
    }
}

pub(crate) fn resolve_raw(entry: &Entry, instance: vk::Instance, ep: EntryPoint) -> Option<RawFn> {
    // The name is a nul-terminated static string.
    unsafe { entry.get_instance_proc_addr(instance, ep.name().as_ptr()) }
}

/// Entry points of one scope, resolved once and kept by symbol.
#[derive(Default)]
pub struct EntryPointTable {
    fns: HashMap<EntryPoint, RawFn>,
}

impl EntryPointTable {
    pub fn resolve(entry: &Entry, instance: vk::Instance, scope: Scope) -> Self {
        let fns = EntryPoint::ALL
            .iter()
            .copied()
            .filter(|ep| ep.scope() == scope)
            .filter_map(|ep| resolve_raw(entry, instance, ep).map(|f| (ep, f)))
            .collect();
        Self { fns }
    }

    pub fn contains(&self, ep: EntryPoint) -> bool {
        self.fns.contains_key(&ep)
    }

    pub fn get<F: EntryPointFn>(&self) -> Result<F, VkError> {
        match self.fns.get(&F::ENTRY) {
            // The table only stores what the driver returned for F::ENTRY.
            Some(&raw) => Ok(unsafe { F::from_raw(raw) }),
            None => Err(VkError::Unsupported(F::ENTRY.label())),
        }
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    pub fn clear(&mut self) {
        self.fns.clear();
    }
}
