// SPDX-License-Identifier: CEPL-1.0
//! Runtime binding of the Vulkan library.

use std::os::raw::c_char;
use std::ptr;

use ash::{vk, Entry};
use tracing::{debug, error, info};

use crate::entry_point::{resolve_raw, EntryPoint, EntryPointFn, EntryPointTable, Scope};
use crate::VkError;

#[cfg(target_os = "windows")]
const DEFAULT_LIBRARY: &str = "vulkan-1.dll";
#[cfg(any(target_os = "macos", target_os = "ios"))]
const DEFAULT_LIBRARY: &str = "libvulkan.1.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "ios")))]
const DEFAULT_LIBRARY: &str = "libvulkan.so.1";

/// Somewhere a driver entry can be obtained from.
pub trait LibrarySource {
    fn name(&self) -> &str;
    fn open(&self) -> Result<Entry, VkError>;
}

/// The system-installed Vulkan loader, opened by file name.
#[derive(Clone, Debug)]
pub struct SystemLibrary {
    name: String,
}

impl SystemLibrary {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SystemLibrary {
    fn default() -> Self {
        Self::named(DEFAULT_LIBRARY)
    }
}

impl LibrarySource for SystemLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Entry, VkError> {
        // Loading runs the library's initializers; nothing else is touched.
        unsafe { Entry::load_from(&self.name) }.map_err(|e| VkError::Library {
            library: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub spec_version: u32,
}

impl From<&vk::ExtensionProperties> for ExtensionDescriptor {
    fn from(p: &vk::ExtensionProperties) -> Self {
        Self {
            name: fixed_str(&p.extension_name),
            spec_version: p.spec_version,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub name: String,
    pub spec_version: u32,
    pub implementation_version: u32,
    pub description: String,
}

impl From<&vk::LayerProperties> for LayerDescriptor {
    fn from(p: &vk::LayerProperties) -> Self {
        Self {
            name: fixed_str(&p.layer_name),
            spec_version: p.spec_version,
            implementation_version: p.implementation_version,
            description: fixed_str(&p.description),
        }
    }
}

fn fixed_str(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

const MAX_ENUMERATE_ATTEMPTS: u32 = 8;

/// Count-then-fill query. Retries a bounded number of times when the
/// driver reports the list grew between the two calls.
fn enumerate<T: Default + Clone>(
    call: &'static str,
    mut query: impl FnMut(*mut u32, *mut T) -> vk::Result,
) -> Result<Vec<T>, VkError> {
    for _ in 0..MAX_ENUMERATE_ATTEMPTS {
        let mut count = 0u32;
        let code = query(&mut count, ptr::null_mut());
        if code != vk::Result::SUCCESS {
            error!("Failed to retrieve {call} count. Error: {code}");
            return Err(VkError::driver(call, code));
        }

        let mut items = vec![T::default(); count as usize];
        match query(&mut count, items.as_mut_ptr()) {
            vk::Result::SUCCESS => {
                items.truncate(count as usize);
                return Ok(items);
            }
            vk::Result::INCOMPLETE => debug!("{call}: list changed while reading, retrying"),
            code => {
                error!("Failed to retrieve {call}. Error: {code}");
                return Err(VkError::driver(call, code));
            }
        }
    }

    error!("{call} kept changing after {MAX_ENUMERATE_ATTEMPTS} attempts");
    Err(VkError::driver(call, vk::Result::INCOMPLETE))
}

/// Owns the opened driver library and everything resolved from it.
pub struct Loader {
    source: Box<dyn LibrarySource>,
    entry: Option<Entry>,
    globals: EntryPointTable,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::with_source(SystemLibrary::default())
    }

    pub fn with_source(source: impl LibrarySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entry: None,
            globals: EntryPointTable::default(),
        }
    }

    pub fn library_name(&self) -> &str {
        self.source.name()
    }

    /// Opens the library if needed, then checks the root accessor can
    /// resolve the global entry points. Calling it again reuses the open
    /// library.
    pub fn initialize(&mut self) -> Result<(), VkError> {
        if self.entry.is_none() {
            let entry = self.source.open().inspect_err(|e| {
                error!("Failed to load vulkan library. Error: {e}");
            })?;
            info!("Loaded vulkan library {}", self.library_name());
            self.entry = Some(entry);
        }

        if let Err(e) = self.load_globals() {
            self.shutdown();
            return Err(e);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.entry.is_some()
    }

    /// Closes the library. Everything resolved from it is forgotten.
    pub fn shutdown(&mut self) {
        self.globals.clear();
        if self.entry.take().is_some() {
            info!("Unloaded vulkan library {}", self.library_name());
        }
    }

    pub fn entry(&self) -> Result<&Entry, VkError> {
        self.entry.as_ref().ok_or_else(|| {
            error!("Vulkan loader has not been initialized!");
            VkError::NotInitialized
        })
    }

    fn load_globals(&mut self) -> Result<(), VkError> {
        let entry = self.entry.as_ref().ok_or(VkError::NotInitialized)?;
        if self.globals.is_empty() {
            self.globals = EntryPointTable::resolve(entry, vk::Instance::null(), Scope::Global);
            debug!("{} global entry points resolved", self.globals.len());
        }

        let root = EntryPoint::EnumerateInstanceExtensionProperties;
        if !self.globals.contains(root) {
            error!("Failed to resolve {} from {}", root.label(), self.library_name());
            return Err(VkError::Unsupported(root.label()));
        }
        Ok(())
    }

    /// Resolves the entry point `F` stands for. Global entry points come
    /// from the table filled at load time; others are looked up against
    /// `instance`.
    pub fn load_fn<F: EntryPointFn>(&self, instance: vk::Instance) -> Result<F, VkError> {
        let entry = self.entry()?;
        if F::ENTRY.scope() == Scope::Global {
            return self.globals.get::<F>();
        }

        match resolve_raw(entry, instance, F::ENTRY) {
            // resolve_raw looked up exactly F::ENTRY's name.
            Some(raw) => Ok(unsafe { F::from_raw(raw) }),
            None => Err(VkError::Unsupported(F::ENTRY.label())),
        }
    }

    pub fn instance_extensions(&self) -> Result<Vec<ExtensionDescriptor>, VkError> {
        let enumerate_fn = self
            .load_fn::<vk::PFN_vkEnumerateInstanceExtensionProperties>(vk::Instance::null())
            .inspect_err(|e| error!("Failed to load extension enumeration: {e}"))?;

        let props = enumerate("extension properties", |count, data| unsafe {
            enumerate_fn(ptr::null(), count, data)
        })?;
        debug!("{} instance extensions available", props.len());
        Ok(props.iter().map(ExtensionDescriptor::from).collect())
    }

    pub fn instance_layers(&self) -> Result<Vec<LayerDescriptor>, VkError> {
        let enumerate_fn = self
            .load_fn::<vk::PFN_vkEnumerateInstanceLayerProperties>(vk::Instance::null())
            .inspect_err(|e| error!("Failed to load layer enumeration: {e}"))?;

        let props = enumerate("layer properties", |count, data| unsafe {
            enumerate_fn(count, data)
        })?;
        debug!("{} instance layers available", props.len());
        Ok(props.iter().map(LayerDescriptor::from).collect())
    }

    /// Highest instance API version the loader supports. A loader without
    /// `vkEnumerateInstanceVersion` only knows 1.0.
    pub fn instance_version(&self) -> Result<u32, VkError> {
        let version_fn =
            match self.load_fn::<vk::PFN_vkEnumerateInstanceVersion>(vk::Instance::null()) {
                Ok(f) => f,
                Err(VkError::Unsupported(_)) => return Ok(vk::API_VERSION_1_0),
                Err(e) => return Err(e),
            };

        let mut version = 0u32;
        let code = unsafe { version_fn(&mut version) };
        if code != vk::Result::SUCCESS {
            return Err(VkError::driver("vkEnumerateInstanceVersion", code));
        }
        Ok(version)
    }
}
