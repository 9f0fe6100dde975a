// SPDX-License-Identifier: CEPL-1.0
//! Picking instance extensions and layers out of what the driver offers.

use std::ffi::CStr;

use ash::{ext, khr};
use tracing::{debug, error};

use crate::loader::{ExtensionDescriptor, LayerDescriptor};
use crate::VkError;

/// Surface-family extensions an instance may enable. The first entry is
/// mandatory; presentation is impossible without it.
pub const SURFACE_EXTENSIONS: [&CStr; 4] = [
    khr::surface::NAME,
    khr::xlib_surface::NAME,
    khr::xcb_surface::NAME,
    khr::wayland_surface::NAME,
];

pub const DEBUG_UTILS_EXTENSION: &CStr = ext::debug_utils::NAME;

pub const VALIDATION_LAYERS: [&CStr; 1] = [c"VK_LAYER_KHRONOS_validation"];

fn label(name: &'static CStr) -> &'static str {
    name.to_str().unwrap_or_default()
}

/// Filters `available` down to the surface family. Fails when the generic
/// surface extension is missing.
pub fn required_extensions(
    available: &[ExtensionDescriptor],
) -> Result<Vec<&'static CStr>, VkError> {
    let mut found_surface = false;
    let mut accepted = Vec::new();

    for ext in available {
        let Some(&name) = SURFACE_EXTENSIONS
            .iter()
            .find(|known| known.to_bytes() == ext.name.as_bytes())
        else {
            continue;
        };
        found_surface |= name == khr::surface::NAME;
        if !accepted.contains(&name) {
            accepted.push(name);
        }
    }

    if !found_surface {
        error!("Failed to load window surface extensions.");
        return Err(VkError::MissingExtension(label(khr::surface::NAME)));
    }

    debug!(?accepted, "surface extensions");
    Ok(accepted)
}

/// Entries of `wanted` that are installed, in `wanted` order.
pub fn existing_layers(
    wanted: &[&'static CStr],
    available: &[LayerDescriptor],
) -> Vec<&'static CStr> {
    wanted
        .iter()
        .copied()
        .filter(|name| available.iter().any(|l| l.name.as_bytes() == name.to_bytes()))
        .collect()
}
