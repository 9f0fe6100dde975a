// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: loads the driver at runtime, brings up an instance with
//! optional validation, and binds surfaces to native windows.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod debug;
pub mod entry_point;
mod error;
pub mod extensions;
pub mod loader;
mod renderer;
pub mod surface;

#[cfg(test)]
mod testing;

pub use debug::{DebugMessenger, Teardown};
pub use error::{describe, ErrorKind, VkError};
pub use loader::{ExtensionDescriptor, LayerDescriptor, LibrarySource, Loader, SystemLibrary};
pub use renderer::{RendererConfig, VkRenderer};
pub use surface::{Surface, SurfaceBackend, SurfaceProvider};
