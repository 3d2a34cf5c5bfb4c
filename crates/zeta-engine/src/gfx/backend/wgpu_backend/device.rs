use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use wgpu::SurfaceError;
use winit::window::Window;

use crate::coords::Extent;
use crate::gfx::backend::PresentStatus;

/// Initialization parameters for the wgpu backend.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is supported everywhere.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference; an unsupported choice falls back to
    /// the first mode the surface offers.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint for the surface's maximum frame latency.
    pub desired_maximum_frame_latency: u32,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// wgpu core objects plus the window surface.
pub(super) struct Device<'w> {
    pub(super) surface: wgpu::Surface<'w>,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) config: wgpu::SurfaceConfiguration,
    size: Extent,
}

impl<'w> Device<'w> {
    pub(super) async fn new(window: &'w Window, init: &WgpuInit) -> Result<Self> {
        let inner = window.inner_size();
        anyhow::ensure!(inner.width > 0 && inner.height > 0, "window has zero size");
        log_native_handles(window);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::debug!("gpu adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("zeta device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, init.prefer_srgb)
            .context("no supported surface formats")?;

        let alpha_mode = init
            .alpha_mode
            .filter(|m| caps.alpha_modes.contains(m))
            .unwrap_or_else(|| {
                caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
            });

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: inner.width,
            height: inner.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size: Extent::new(inner.width, inner.height),
        })
    }

    pub(super) fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub(super) fn size(&self) -> Extent {
        self.size
    }

    /// Reconfigures the surface. A zero size is remembered but not applied;
    /// frames are skipped until the surface has an area again.
    pub(super) fn resize(&mut self, size: Extent) {
        self.size = size;
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(super) fn acquire(&self) -> Result<wgpu::SurfaceTexture, SurfaceError> {
        self.surface.get_current_texture()
    }

    /// Maps a surface error to what the frame reports, reconfiguring when
    /// the surface went stale.
    pub(super) fn handle_surface_error(&mut self, err: SurfaceError) -> PresentStatus {
        log::warn!("surface error: {err}");
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if !self.size.is_empty() {
                    self.surface.configure(&self.device, &self.config);
                }
                PresentStatus::Skipped
            }
            SurfaceError::OutOfMemory => PresentStatus::Lost,
            SurfaceError::Timeout | SurfaceError::Other => PresentStatus::Skipped,
        }
    }
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}

fn log_native_handles(window: &Window) {
    let window_kind = match window.window_handle().map(|h| h.as_raw()) {
        Ok(RawWindowHandle::Win32(_)) => "win32",
        Ok(RawWindowHandle::AppKit(_)) => "appkit",
        Ok(RawWindowHandle::Xlib(_)) => "xlib",
        Ok(RawWindowHandle::Xcb(_)) => "xcb",
        Ok(RawWindowHandle::Wayland(_)) => "wayland",
        Ok(RawWindowHandle::Web(_)) => "web",
        Ok(_) => "other",
        Err(e) => {
            log::warn!("native window handle unavailable: {e}");
            return;
        }
    };

    let display_kind = match window.display_handle().map(|h| h.as_raw()) {
        Ok(RawDisplayHandle::Windows(_)) => "windows",
        Ok(RawDisplayHandle::AppKit(_)) => "appkit",
        Ok(RawDisplayHandle::Xlib(_)) => "xlib",
        Ok(RawDisplayHandle::Xcb(_)) => "xcb",
        Ok(RawDisplayHandle::Wayland(_)) => "wayland",
        Ok(_) => "other",
        Err(_) => "unavailable",
    };

    log::debug!("native window: {window_kind}, display: {display_kind}");
}
