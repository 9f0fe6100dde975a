// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use anyhow::Context;
use ash::vk;
use sketch_core::{Version, ENGINE_NAME};
use sketch_render::{DriverSummary, NativeWindow, Renderer};
use tracing::{error, info, warn};

use crate::debug::{DebugMessenger, Teardown};
use crate::extensions::{
    existing_layers, required_extensions, DEBUG_UTILS_EXTENSION, VALIDATION_LAYERS,
};
use crate::loader::Loader;
use crate::surface::{provider_for, Surface, SurfaceBackend};
use crate::VkError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    pub app_name: String,
    pub app_version: Version,
    pub engine_name: String,
    pub engine_version: Version,
    /// Enable the Khronos validation layer and the debug messenger when
    /// they are installed.
    pub validation: bool,
    pub surface: SurfaceBackend,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: ENGINE_NAME.to_owned(),
            app_version: Version::current(),
            engine_name: ENGINE_NAME.to_owned(),
            engine_version: Version::current(),
            validation: cfg!(debug_assertions),
            surface: SurfaceBackend::Auto,
        }
    }
}

impl RendererConfig {
    /// Defaults, overridden by SKETCH_VALIDATION and SKETCH_SURFACE.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides found through `lookup`. Unparsable values are
    /// logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup("SKETCH_VALIDATION").as_deref() {
            Some("1") => self.validation = true,
            Some("0") => self.validation = false,
            Some(other) => warn!("Ignoring SKETCH_VALIDATION={other}, expected 0 or 1"),
            None => {}
        }
        if let Some(value) = lookup("SKETCH_SURFACE") {
            match value.parse() {
                Ok(backend) => self.surface = backend,
                Err(e) => warn!("Ignoring SKETCH_SURFACE: {e}"),
            }
        }
        self
    }
}

fn vk_version(v: Version) -> u32 {
    vk::make_api_version(0, v.major, v.minor, v.patch)
}

fn version_text(v: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(v),
        vk::api_version_minor(v),
        vk::api_version_patch(v)
    )
}

fn c_string(what: &str, value: &str) -> Result<CString, VkError> {
    CString::new(value).map_err(|_| VkError::Config(format!("{what} contains a NUL byte")))
}

fn names(list: &[&'static CStr]) -> Vec<String> {
    list.iter()
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// An `ash::Instance` destroyed when dropped. Must not outlive the loader
/// it came from.
struct OwnedInstance(ash::Instance);

impl OwnedInstance {
    fn handle(&self) -> vk::Instance {
        self.0.handle()
    }
}

impl Drop for OwnedInstance {
    fn drop(&mut self) {
        // All children (surfaces, messenger) are released before this runs.
        unsafe { self.0.destroy_instance(None) };
    }
}

pub struct VkRenderer {
    loader: Loader,
    config: RendererConfig,
    messenger: DebugMessenger,
    instance: Option<OwnedInstance>,
    surfaces: Vec<Surface>,
    summary: DriverSummary,
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl VkRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_loader(Loader::new(), config)
    }

    pub fn with_loader(loader: Loader, config: RendererConfig) -> Self {
        Self {
            loader,
            config,
            messenger: DebugMessenger::new(),
            instance: None,
            surfaces: Vec::new(),
            summary: DriverSummary::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn messenger(&self) -> &DebugMessenger {
        &self.messenger
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn instance(&self) -> Option<vk::Instance> {
        self.instance.as_ref().map(OwnedInstance::handle)
    }

    pub fn is_ready(&self) -> bool {
        self.instance.is_some()
    }

    pub fn initialize(&mut self) -> Result<(), VkError> {
        if self.is_ready() {
            return Ok(());
        }

        let result = self
            .loader
            .initialize()
            .and_then(|()| self.create_instance());
        if result.is_err() {
            self.shutdown();
        }
        result
    }

    fn validation_layers(&self) -> Vec<&'static CStr> {
        let available = match self.loader.instance_layers() {
            Ok(layers) => layers,
            Err(e) => {
                warn!("Failed to enumerate instance layers: {e}");
                return Vec::new();
            }
        };

        let layers = existing_layers(&VALIDATION_LAYERS, &available);
        if layers.is_empty() {
            warn!("Validation requested but no validation layer is installed.");
        } else {
            info!("Enabling validation layers: {:?}", names(&layers));
        }
        layers
    }

    fn create_instance(&mut self) -> Result<(), VkError> {
        let app_name = c_string("application name", &self.config.app_name)?;
        let engine_name = c_string("engine name", &self.config.engine_name)?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk_version(self.config.app_version))
            .engine_name(&engine_name)
            .engine_version(vk_version(self.config.engine_version))
            .api_version(vk::API_VERSION_1_3);

        let available = self.loader.instance_extensions()?;
        let mut extensions = required_extensions(&available)?;

        let layers = if self.config.validation {
            self.validation_layers()
        } else {
            Vec::new()
        };
        if !layers.is_empty() {
            extensions.push(DEBUG_UTILS_EXTENSION);
        }

        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        // Covers messages emitted while the instance itself is created.
        let mut debug_info = DebugMessenger::create_info();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if !layers.is_empty() {
            create_info = create_info.push_next(&mut debug_info);
        }

        let entry = self.loader.entry()?;
        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|code| {
            error!("Failed to create vulkan instance. Error: {code}");
            VkError::driver("vkCreateInstance", code)
        })?;
        let instance = OwnedInstance(instance);
        info!(
            "Created vulkan instance for {} {}",
            self.config.app_name, self.config.app_version
        );

        if self.config.validation {
            if let Err(e) = self.messenger.initialize(&self.loader, instance.handle()) {
                warn!("Continuing without debug messenger: {e}");
            }
        }

        let version = self.loader.instance_version().unwrap_or(vk::API_VERSION_1_0);
        self.summary = DriverSummary {
            api: "Vulkan".to_owned(),
            version: version_text(version),
            extensions: names(&extensions),
            layers: names(&layers),
        };
        self.instance = Some(instance);
        Ok(())
    }

    /// Creates a surface for `window` and keeps it until shutdown.
    pub fn initialize_window(&mut self, window: &dyn NativeWindow) -> Result<(), VkError> {
        let Some(instance) = self.instance() else {
            error!("Renderer must be initialized before attaching a window.");
            return Err(VkError::NotInitialized);
        };

        let provider = provider_for(self.config.surface, window)?;
        let extension = provider.extension();
        if !self
            .summary
            .extensions
            .iter()
            .any(|e| e.as_bytes() == extension.to_bytes())
        {
            error!("Instance was created without {extension:?}.");
            return Err(VkError::MissingExtension(
                extension.to_str().unwrap_or_default(),
            ));
        }

        let mut surface = Surface::new(provider);
        surface.initialize(&self.loader, instance, window)?;
        self.surfaces.push(surface);
        Ok(())
    }

    /// Releases surfaces, the messenger, the instance and the loader, in
    /// that order.
    pub fn shutdown(&mut self) {
        if let Some(instance) = self.instance() {
            for mut surface in self.surfaces.drain(..) {
                if surface.shutdown(&self.loader, instance) == Teardown::Unresolved {
                    warn!("Could not destroy {} surface.", surface.backend());
                }
            }
            if self.messenger.shutdown(&self.loader, instance) == Teardown::Unresolved {
                warn!("Could not destroy debug messenger.");
            }
        }
        self.surfaces.clear();
        // Children of a destroyed instance are gone with it.
        self.messenger = DebugMessenger::new();

        if self.instance.take().is_some() {
            info!("Destroyed vulkan instance");
        }
        self.summary = DriverSummary::default();
        self.loader.shutdown();
    }
}

impl Renderer for VkRenderer {
    fn initialize(&mut self) -> anyhow::Result<()> {
        VkRenderer::initialize(self).context("initializing vulkan renderer")
    }

    fn initialize_window(&mut self, window: &dyn NativeWindow) -> anyhow::Result<()> {
        VkRenderer::initialize_window(self, window).context("creating window surface")
    }

    fn shutdown(&mut self) {
        VkRenderer::shutdown(self)
    }

    fn is_ready(&self) -> bool {
        VkRenderer::is_ready(self)
    }

    fn summary(&self) -> &DriverSummary {
        &self.summary
    }
}
