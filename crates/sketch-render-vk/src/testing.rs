// SPDX-License-Identifier: CEPL-1.0
//! An in-process stand-in for the Vulkan loader, plus fake windows.
//!
//! State is thread-local so every test (one thread each) sees its own
//! driver.

use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::os::raw::c_char;
use std::ptr::NonNull;

use ash::vk::{self, Handle};
use ash::{Entry, StaticFn};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle,
    RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle, WindowHandle, XcbDisplayHandle,
    XcbWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};
use sketch_render::{NativeWindow, RenderSize};

use crate::loader::LibrarySource;
use crate::VkError;

const INSTANCE: u64 = 0x1000;

#[derive(Clone, Debug)]
pub struct State {
    pub extensions: Vec<&'static str>,
    pub layers: Vec<&'static str>,
    pub hidden: Vec<&'static str>,
    pub failures: Vec<(&'static str, vk::Result)>,
    pub library_missing: bool,
    /// Number of extension count queries that under-report by one.
    pub stale_counts: u32,

    pub opens: u32,
    pub instances_created: u32,
    pub instances_destroyed: u32,
    pub messengers_created: u32,
    pub messengers_destroyed: u32,
    pub surfaces_created: u32,
    pub surfaces_destroyed: u32,
    pub enabled_extensions: Vec<String>,
    pub enabled_layers: Vec<String>,
    pub chained_messenger: bool,
    pub requested_api: u32,
    pub last_window: Option<u64>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            extensions: vec![
                "VK_KHR_surface",
                "VK_KHR_xlib_surface",
                "VK_KHR_xcb_surface",
                "VK_KHR_wayland_surface",
                "VK_EXT_debug_utils",
            ],
            layers: vec!["VK_LAYER_KHRONOS_validation"],
            hidden: Vec::new(),
            failures: Vec::new(),
            library_missing: false,
            stale_counts: 0,
            opens: 0,
            instances_created: 0,
            instances_destroyed: 0,
            messengers_created: 0,
            messengers_destroyed: 0,
            surfaces_created: 0,
            surfaces_destroyed: 0,
            enabled_extensions: Vec::new(),
            enabled_layers: Vec::new(),
            chained_messenger: false,
            requested_api: 0,
            last_window: None,
        }
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|s| f(&mut s.borrow_mut()))
}

fn failure(name: &str) -> Option<vk::Result> {
    with_state(|s| {
        s.failures
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, code)| code)
    })
}

/// Handle to this thread's fake driver.
pub struct FakeDriver {
    _thread_bound: PhantomData<*const ()>,
}

impl FakeDriver {
    pub fn install() -> Self {
        with_state(|s| *s = State::default());
        Self {
            _thread_bound: PhantomData,
        }
    }

    pub fn state(&self) -> State {
        with_state(|s| s.clone())
    }

    pub fn update(&self, f: impl FnOnce(&mut State)) {
        with_state(f)
    }

    /// Makes `vkGetInstanceProcAddr` answer null for `name`.
    pub fn hide(&self, name: &'static str) {
        with_state(|s| s.hidden.push(name));
    }

    /// Makes the entry point `name` return `code`.
    pub fn fail(&self, name: &'static str, code: vk::Result) {
        with_state(|s| s.failures.push((name, code)));
    }
}

pub struct FakeLibrary;

impl LibrarySource for FakeLibrary {
    fn name(&self) -> &str {
        "libvulkan-fake.so"
    }

    fn open(&self) -> Result<Entry, VkError> {
        let missing = with_state(|s| {
            s.opens += 1;
            s.library_missing
        });
        if missing {
            return Err(VkError::Library {
                library: self.name().to_owned(),
                reason: "cannot open shared object file".to_owned(),
            });
        }
        Ok(entry())
    }
}

pub fn entry() -> Entry {
    // The fake accessor answers every name ash asks for, or null.
    unsafe {
        Entry::from_static_fn(StaticFn {
            get_instance_proc_addr,
        })
    }
}

pub fn instance_handle() -> vk::Instance {
    vk::Instance::from_raw(INSTANCE)
}

fn fill(dst: &mut [c_char], src: &str) {
    for (d, b) in dst.iter_mut().zip(src.bytes().chain(std::iter::once(0))) {
        *d = b as c_char;
    }
}

unsafe fn names(ptrs: *const *const c_char, count: u32) -> Vec<String> {
    if ptrs.is_null() {
        return Vec::new();
    }
    (0..count as usize)
        .map(|i| unsafe { CStr::from_ptr(*ptrs.add(i)) }.to_string_lossy().into_owned())
        .collect()
}

macro_rules! raw {
    ($f:expr, $pfn:ty) => {
        Some(unsafe { std::mem::transmute::<$pfn, unsafe extern "system" fn()>($f) })
    };
}

unsafe extern "system" fn get_instance_proc_addr(
    _instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = unsafe { CStr::from_ptr(p_name) };
    let Ok(name) = name.to_str() else {
        return None;
    };
    if with_state(|s| s.hidden.iter().any(|h| *h == name)) {
        return None;
    }

    match name {
        "vkEnumerateInstanceExtensionProperties" => raw!(
            enumerate_instance_extension_properties,
            vk::PFN_vkEnumerateInstanceExtensionProperties
        ),
        "vkEnumerateInstanceLayerProperties" => raw!(
            enumerate_instance_layer_properties,
            vk::PFN_vkEnumerateInstanceLayerProperties
        ),
        "vkEnumerateInstanceVersion" => {
            raw!(enumerate_instance_version, vk::PFN_vkEnumerateInstanceVersion)
        }
        "vkCreateInstance" => raw!(create_instance, vk::PFN_vkCreateInstance),
        "vkDestroyInstance" => raw!(destroy_instance, vk::PFN_vkDestroyInstance),
        "vkCreateDebugUtilsMessengerEXT" => raw!(
            create_debug_utils_messenger,
            vk::PFN_vkCreateDebugUtilsMessengerEXT
        ),
        "vkDestroyDebugUtilsMessengerEXT" => raw!(
            destroy_debug_utils_messenger,
            vk::PFN_vkDestroyDebugUtilsMessengerEXT
        ),
        "vkCreateXlibSurfaceKHR" => raw!(create_xlib_surface, vk::PFN_vkCreateXlibSurfaceKHR),
        "vkCreateXcbSurfaceKHR" => raw!(create_xcb_surface, vk::PFN_vkCreateXcbSurfaceKHR),
        "vkCreateWaylandSurfaceKHR" => {
            raw!(create_wayland_surface, vk::PFN_vkCreateWaylandSurfaceKHR)
        }
        "vkDestroySurfaceKHR" => raw!(destroy_surface, vk::PFN_vkDestroySurfaceKHR),
        _ => None,
    }
}

unsafe extern "system" fn enumerate_instance_extension_properties(
    _p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if let Some(code) = failure("vkEnumerateInstanceExtensionProperties") {
        return code;
    }
    let (extensions, stale) = with_state(|s| (s.extensions.clone(), s.stale_counts));
    let count = unsafe { &mut *p_property_count };

    if p_properties.is_null() {
        *count = if stale > 0 {
            extensions.len().saturating_sub(1) as u32
        } else {
            extensions.len() as u32
        };
        return vk::Result::SUCCESS;
    }

    let written = (*count as usize).min(extensions.len());
    for (i, name) in extensions.iter().take(written).enumerate() {
        let slot = unsafe { &mut *p_properties.add(i) };
        fill(&mut slot.extension_name, name);
        slot.spec_version = 1;
    }
    *count = written as u32;
    if written < extensions.len() {
        with_state(|s| s.stale_counts = s.stale_counts.saturating_sub(1));
        return vk::Result::INCOMPLETE;
    }
    vk::Result::SUCCESS
}

unsafe extern "system" fn enumerate_instance_layer_properties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    if let Some(code) = failure("vkEnumerateInstanceLayerProperties") {
        return code;
    }
    let layers = with_state(|s| s.layers.clone());
    let count = unsafe { &mut *p_property_count };

    if p_properties.is_null() {
        *count = layers.len() as u32;
        return vk::Result::SUCCESS;
    }

    let written = (*count as usize).min(layers.len());
    for (i, name) in layers.iter().take(written).enumerate() {
        let slot = unsafe { &mut *p_properties.add(i) };
        fill(&mut slot.layer_name, name);
        fill(&mut slot.description, "fake layer");
        slot.spec_version = vk::API_VERSION_1_3;
        slot.implementation_version = 1;
    }
    *count = written as u32;
    if written < layers.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    }
}

unsafe extern "system" fn enumerate_instance_version(p_api_version: *mut u32) -> vk::Result {
    unsafe { *p_api_version = vk::API_VERSION_1_3 };
    vk::Result::SUCCESS
}

unsafe extern "system" fn create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    if let Some(code) = failure("vkCreateInstance") {
        return code;
    }
    let info = unsafe { &*p_create_info };

    let extensions =
        unsafe { names(info.pp_enabled_extension_names, info.enabled_extension_count) };
    let layers = unsafe { names(info.pp_enabled_layer_names, info.enabled_layer_count) };

    let mut chained = false;
    let mut next = info.p_next.cast::<vk::BaseInStructure<'_>>();
    while !next.is_null() {
        let base = unsafe { &*next };
        chained |= base.s_type == vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT;
        next = base.p_next;
    }

    let requested_api = if info.p_application_info.is_null() {
        0
    } else {
        unsafe { (*info.p_application_info).api_version }
    };

    with_state(|s| {
        s.instances_created += 1;
        s.enabled_extensions = extensions;
        s.enabled_layers = layers;
        s.chained_messenger = chained;
        s.requested_api = requested_api;
    });
    unsafe { *p_instance = vk::Instance::from_raw(INSTANCE) };
    vk::Result::SUCCESS
}

unsafe extern "system" fn destroy_instance(
    _instance: vk::Instance,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|s| s.instances_destroyed += 1);
}

unsafe extern "system" fn create_debug_utils_messenger(
    _instance: vk::Instance,
    _p_create_info: *const vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_messenger: *mut vk::DebugUtilsMessengerEXT,
) -> vk::Result {
    if let Some(code) = failure("vkCreateDebugUtilsMessengerEXT") {
        return code;
    }
    let n = with_state(|s| {
        s.messengers_created += 1;
        s.messengers_created
    });
    unsafe { *p_messenger = vk::DebugUtilsMessengerEXT::from_raw(0x2000 + n as u64) };
    vk::Result::SUCCESS
}

unsafe extern "system" fn destroy_debug_utils_messenger(
    _instance: vk::Instance,
    _messenger: vk::DebugUtilsMessengerEXT,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|s| s.messengers_destroyed += 1);
}

fn new_surface(name: &str, window: u64, p_surface: *mut vk::SurfaceKHR) -> vk::Result {
    if let Some(code) = failure(name) {
        return code;
    }
    let n = with_state(|s| {
        s.surfaces_created += 1;
        s.last_window = Some(window);
        s.surfaces_created
    });
    unsafe { *p_surface = vk::SurfaceKHR::from_raw(0x3000 + n as u64) };
    vk::Result::SUCCESS
}

unsafe extern "system" fn create_xlib_surface(
    _instance: vk::Instance,
    p_create_info: *const vk::XlibSurfaceCreateInfoKHR<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result {
    let window = unsafe { (*p_create_info).window } as u64;
    new_surface("vkCreateXlibSurfaceKHR", window, p_surface)
}

unsafe extern "system" fn create_xcb_surface(
    _instance: vk::Instance,
    p_create_info: *const vk::XcbSurfaceCreateInfoKHR<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result {
    let window = unsafe { (*p_create_info).window } as u64;
    new_surface("vkCreateXcbSurfaceKHR", window, p_surface)
}

unsafe extern "system" fn create_wayland_surface(
    _instance: vk::Instance,
    p_create_info: *const vk::WaylandSurfaceCreateInfoKHR<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result {
    let window = unsafe { (*p_create_info).surface } as usize as u64;
    new_surface("vkCreateWaylandSurfaceKHR", window, p_surface)
}

unsafe extern "system" fn destroy_surface(
    _instance: vk::Instance,
    _surface: vk::SurfaceKHR,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|s| s.surfaces_destroyed += 1);
}

/// A window with fabricated native handles. Nothing ever dereferences them.
pub struct FakeWindow {
    window: Option<RawWindowHandle>,
    display: Option<RawDisplayHandle>,
    size: RenderSize,
}

fn fake_ptr() -> NonNull<c_void> {
    NonNull::dangling()
}

impl FakeWindow {
    pub fn xlib(window: u64, size: RenderSize) -> Self {
        Self {
            window: Some(RawWindowHandle::Xlib(XlibWindowHandle::new(window as _))),
            display: Some(RawDisplayHandle::Xlib(XlibDisplayHandle::new(
                Some(fake_ptr()),
                0,
            ))),
            size,
        }
    }

    pub fn xcb(window: u32, size: RenderSize) -> Self {
        let window = NonZeroU32::new(window).unwrap_or(NonZeroU32::MIN);
        Self {
            window: Some(RawWindowHandle::Xcb(XcbWindowHandle::new(window))),
            display: Some(RawDisplayHandle::Xcb(XcbDisplayHandle::new(
                Some(fake_ptr()),
                0,
            ))),
            size,
        }
    }

    pub fn wayland(size: RenderSize) -> Self {
        Self {
            window: Some(RawWindowHandle::Wayland(WaylandWindowHandle::new(fake_ptr()))),
            display: Some(RawDisplayHandle::Wayland(WaylandDisplayHandle::new(
                fake_ptr(),
            ))),
            size,
        }
    }

    /// A window whose windowing system cannot hand out native handles.
    pub fn detached(size: RenderSize) -> Self {
        Self {
            window: None,
            display: None,
            size,
        }
    }

    /// An Xlib window paired with a display of another kind.
    pub fn mismatched(size: RenderSize) -> Self {
        Self {
            display: Some(RawDisplayHandle::Wayland(WaylandDisplayHandle::new(
                fake_ptr(),
            ))),
            ..Self::xlib(7, size)
        }
    }
}

impl HasWindowHandle for FakeWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        match self.window {
            // The fabricated handle lives as long as self.
            Some(raw) => Ok(unsafe { WindowHandle::borrow_raw(raw) }),
            None => Err(HandleError::Unavailable),
        }
    }
}

impl HasDisplayHandle for FakeWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        match self.display {
            Some(raw) => Ok(unsafe { DisplayHandle::borrow_raw(raw) }),
            None => Err(HandleError::Unavailable),
        }
    }
}

impl NativeWindow for FakeWindow {
    fn pixel_size(&self) -> RenderSize {
        self.size
    }
}
