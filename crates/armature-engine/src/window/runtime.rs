use anyhow::{Context, Result, bail};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{Canvas, CanvasApp, CanvasHost, CanvasState};
use crate::device::{Gpu, GpuInit, ManagedContext, SurfaceErrorAction, WgpuContext};
use crate::input::platform::winit::translate_window_event;
use crate::render::SceneConfig;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gpu: GpuInit,
    pub scene: SceneConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "armature".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            gpu: GpuInit::default(),
            scene: SceneConfig::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives `app` until the window closes.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: 'static + CanvasApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.fatal.map_or(Ok(()), Err)
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: CanvasApp + 'static,
{
    config: RuntimeConfig,

    /// Held until the window exists, then moved into `host`.
    pending_app: Option<A>,
    host: Option<CanvasHost<A>>,
    window: Option<WindowEntry>,

    fatal: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: CanvasApp + 'static,
{
    fn new(config: RuntimeConfig, app: A) -> Self {
        Self {
            config,
            pending_app: Some(app),
            host: None,
            window: None,
            fatal: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.fatal.get_or_insert(error);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(host) = self.host.as_mut() {
            host.dispose();
        }
        // The canvas holds device handles; release it before the surface.
        self.host = None;
        self.window = None;
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.config.gpu.clone();
        let entry = WindowEntry::try_new(window, |w| pollster::block_on(Gpu::new(w, gpu_init)))
            .context("GPU initialization failed for window")?;

        let (context, mut size) = entry.with_gpu(|gpu| (gpu.create_context(), gpu.size()));
        if size.width == 0 || size.height == 0 {
            // Started minimized: lay out for the requested size until the first resize.
            size = entry.with_window(|w| self.config.initial_size.to_physical(w.scale_factor()));
        }
        let canvas = Canvas::new(
            ManagedContext::new(context),
            size.width,
            size.height,
            self.config.scene,
        )
        .context("failed to create canvas")?;

        let app = self
            .pending_app
            .take()
            .context("canvas app already started")?;
        let mut host = CanvasHost::new(canvas, app);
        if host.start() == CanvasState::Failed {
            log::warn!("canvas app failed to start; nothing will be rendered");
        }

        entry.with_window(|w| w.request_redraw());
        self.window = Some(entry);
        self.host = Some(host);
        Ok(())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let (Some(entry), Some(host)) = (self.window.as_mut(), self.host.as_mut()) else {
            return;
        };
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        let size = entry.with_gpu(|gpu| gpu.size());
        host.resize(size.width, size.height);
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(entry), Some(host)) = (self.window.as_mut(), self.host.as_mut()) else {
            return Ok(());
        };
        entry.with_gpu_mut(|gpu| render_frame(gpu, host))
    }
}

/// Acquires a surface texture, runs one canvas frame into it and presents it.
fn render_frame<A: CanvasApp>(gpu: &mut Gpu<'_>, host: &mut CanvasHost<A>) -> Result<()> {
    let frame = match gpu.begin_frame() {
        Ok(frame) => frame,
        Err(err) => {
            let reason = err.to_string();
            return match gpu.handle_surface_error(err) {
                SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                    log::debug!("skipping frame: {reason}");
                    Ok(())
                }
                SurfaceErrorAction::Fatal => bail!("surface error: {reason}"),
            };
        }
    };

    let Some(backend) = host.canvas_mut().context.backend_mut::<WgpuContext>() else {
        bail!("canvas is not backed by a wgpu context");
    };
    backend.begin_frame(frame.view.clone(), frame.width, frame.height);

    if let Err(e) = host.frame() {
        log::error!("frame failed: {e:#}");
    }

    if let Some(backend) = host.canvas_mut().context.backend_mut::<WgpuContext>() {
        backend.end_frame();
    }
    gpu.present(frame);
    Ok(())
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CanvasApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_requested {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e.context("failed to create initial window"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: the canvas animates every frame.
        if let Some(entry) = self.window.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if let Some(host) = self.host.as_mut() {
            if let Some(ev) = translate_window_event(&host.canvas().input, &event) {
                host.handle_input(&ev);
            }
        }

        match &event {
            WindowEvent::CloseRequested => {
                log::info!("window closed");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => self.resize(*new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(host) = self.host.as_mut() {
            host.dispose();
        }
    }
}
