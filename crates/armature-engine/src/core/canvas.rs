use std::time::Instant;

use anyhow::Result;

use crate::device::{GraphicsContext, ManagedContext, RenderResult, Restorable};
use crate::input::{Input, InputEvent};
use crate::paint::Color;
use crate::render::{ResizeMode, SceneConfig, SceneRenderer};
use crate::time::TimeKeeper;

use super::app::CanvasApp;

/// Everything an app draws and reads input with.
pub struct Canvas {
    pub context: ManagedContext,
    pub renderer: SceneRenderer,
    pub input: Input,
    pub time: TimeKeeper,

    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(
        mut context: ManagedContext,
        width: u32,
        height: u32,
        config: SceneConfig,
    ) -> RenderResult<Self> {
        let renderer = SceneRenderer::new(&mut context, width, height, config)?;
        Ok(Self {
            context,
            renderer,
            input: Input::new(),
            time: TimeKeeper::new(),
            width,
            height,
        })
    }

    /// Drawable size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a new drawable size. The camera follows on the next
    /// [`resize_renderer`](Self::resize_renderer).
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Applies the drawable size to the viewport and camera.
    pub fn resize_renderer(&mut self, mode: ResizeMode) {
        self.renderer
            .resize(&mut self.context, mode, self.width, self.height);
    }

    pub fn clear(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.context.gl().clear(Color::new(r, g, b, a));
    }

    /// Swaps in a fresh backend after a context loss and rebuilds the
    /// renderer's resources. App-owned textures rebuild on their next use.
    pub fn restore_with(&mut self, gl: impl GraphicsContext) -> RenderResult<()> {
        self.context.restore_with(gl);
        self.renderer.restore(&mut self.context)
    }
}

/// Lifecycle of a [`CanvasHost`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CanvasState {
    Created,
    Running,
    /// Loading or initialization failed; frames are skipped.
    Failed,
    Disposed,
}

/// Drives a [`CanvasApp`] over a [`Canvas`].
pub struct CanvasHost<A> {
    canvas: Canvas,
    app: A,
    state: CanvasState,
}

impl<A: CanvasApp> CanvasHost<A> {
    pub fn new(canvas: Canvas, app: A) -> Self {
        Self {
            canvas,
            app,
            state: CanvasState::Created,
        }
    }

    pub fn state(&self) -> CanvasState {
        self.state
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Loads assets, then initializes the app. Only acts once.
    pub fn start(&mut self) -> CanvasState {
        if self.state != CanvasState::Created {
            return self.state;
        }

        let started = match self.app.load_assets(&mut self.canvas) {
            Ok(()) => self.app.initialize(&mut self.canvas),
            Err(e) => Err(e),
        };

        match started {
            Ok(()) => {
                self.canvas.time.reset();
                self.state = CanvasState::Running;
                log::info!("canvas started ({}x{})", self.canvas.width, self.canvas.height);
            }
            Err(e) => {
                self.app.error(&mut self.canvas, &e);
                self.state = CanvasState::Failed;
            }
        }
        self.state
    }

    pub fn frame(&mut self) -> Result<()> {
        self.frame_at(Instant::now())
    }

    /// Runs one update/render pass timed at `now`. A no-op unless running.
    ///
    /// When `render` fails the active renderer is closed so the next frame
    /// can begin again.
    pub fn frame_at(&mut self, now: Instant) -> Result<()> {
        if self.state != CanvasState::Running {
            return Ok(());
        }

        let delta = self.canvas.time.update_at(now);
        self.app.update(&mut self.canvas, delta);

        let rendered = self.app.render(&mut self.canvas);
        if rendered.is_err() {
            if let Err(e) = self.canvas.renderer.end(&mut self.canvas.context) {
                log::debug!("closing renderer after failed frame: {e}");
            }
        }
        rendered
    }

    pub fn handle_input(&mut self, event: &InputEvent) {
        self.canvas.input.handle(event);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_size(width, height);
    }

    /// Calls the app's `dispose` and releases the renderer. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == CanvasState::Disposed {
            return;
        }
        self.app.dispose(&mut self.canvas);
        self.canvas.renderer.dispose(&mut self.canvas.context);
        self.state = CanvasState::Disposed;
        log::info!("canvas disposed");
    }
}
