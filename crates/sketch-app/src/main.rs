// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use sketch_core::init_tracing;
use sketch_platform::PlatformWindow;
use sketch_render::Renderer;
use sketch_render_vk::{RendererConfig, SurfaceBackend, VkRenderer};
use tracing::{error, info, warn};

use sketch_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "sketch.toml")]
    config: PathBuf,

    /// Surface backend: auto | xlib | xcb | wayland
    #[arg(long)]
    surface: Option<SurfaceBackend>,

    /// Enable the validation layer and debug messenger
    #[arg(long)]
    validation: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum SurfaceCfg {
    #[default]
    Auto,
    Xlib,
    Xcb,
    Wayland,
}

impl From<SurfaceCfg> for SurfaceBackend {
    fn from(cfg: SurfaceCfg) -> Self {
        match cfg {
            SurfaceCfg::Auto => SurfaceBackend::Auto,
            SurfaceCfg::Xlib => SurfaceBackend::Xlib,
            SurfaceCfg::Xcb => SurfaceBackend::Xcb,
            SurfaceCfg::Wayland => SurfaceBackend::Wayland,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
struct RenderCfg {
    /// Unset means "on in debug builds".
    #[serde(default)]
    validation: Option<bool>,
    #[serde(default)]
    surface: SurfaceCfg,
}

#[derive(Debug, Deserialize, Clone)]
struct WindowCfg {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_title() -> String {
    sketch_core::ENGINE_NAME.to_owned()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}

#[derive(Debug, Deserialize, Default)]
struct AppCfg {
    #[serde(default)]
    render: RenderCfg,
    #[serde(default)]
    window: WindowCfg,
}

fn parse_cfg(text: &str) -> Result<AppCfg> {
    toml::from_str(text).context("parsing configuration")
}

fn load_cfg(path: &Path) -> AppCfg {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            info!("no config at {}, using defaults", path.display());
            return AppCfg::default();
        }
    };
    parse_cfg(&text).unwrap_or_else(|e| {
        warn!("ignoring {}: {e:#}", path.display());
        AppCfg::default()
    })
}

/// Defaults, then the file, then SKETCH_* variables, then the command line.
fn renderer_config(
    cfg: &AppCfg,
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
) -> RendererConfig {
    let mut rc = RendererConfig::default();
    if let Some(on) = cfg.render.validation {
        rc.validation = on;
    }
    rc.surface = cfg.render.surface.into();

    let mut rc = rc.with_overrides(env);
    if let Some(on) = args.validation {
        rc.validation = on;
    }
    if let Some(surface) = args.surface {
        rc.surface = surface;
    }
    rc
}

fn start(renderer: &mut dyn Renderer, window: &PlatformWindow) -> Result<()> {
    renderer.initialize()?;
    renderer.initialize_window(window)?;

    let summary = renderer.summary();
    info!("{} {}", summary.api, summary.version);
    info!("extensions = {:?}", summary.extensions);
    info!("layers = {:?}", summary.layers);
    Ok(())
}

struct App {
    window_cfg: WindowCfg,
    renderer_cfg: RendererConfig,
    // Dropped before `window`: its surfaces refer to the native window.
    renderer: Option<VkRenderer>,
    window: Option<PlatformWindow>,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(window_cfg: WindowCfg, renderer_cfg: RendererConfig) -> Self {
        App {
            window_cfg,
            renderer_cfg,
            renderer: None,
            window: None,
            failure: None,
        }
    }

    /// Shuts the renderer down, then closes the window.
    fn release(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.shutdown();
        }
        self.window = None;
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.failure = Some(e);
        self.release();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.window_cfg.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.window_cfg.width.max(1),
                self.window_cfg.height.max(1),
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => PlatformWindow::new(w),
            Err(e) => return self.fail(event_loop, anyhow::anyhow!("create_window: {e}")),
        };

        let mut renderer = VkRenderer::new(self.renderer_cfg.clone());
        if let Err(e) = start(&mut renderer, &window) {
            return self.fail(event_loop, e);
        }

        self.window = Some(window);
        self.renderer = Some(renderer);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.release();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Resized → {}x{}", size.width, size.height);
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_cfg(&args.config);
    let renderer_cfg = renderer_config(&cfg, &args, |key| std::env::var(key).ok());
    info!(
        "validation = {}, surface = {}",
        renderer_cfg.validation, renderer_cfg.surface
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(cfg.window, renderer_cfg);
    event_loop.run_app(&mut app)?;
    app.release();

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
