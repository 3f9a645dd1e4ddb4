mod rig;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};

use armature_engine::core::{Canvas, CanvasApp};
use armature_engine::input::InputListener;
use armature_engine::logging::{LoggingConfig, init_logging};
use armature_engine::paint::Color;
use armature_engine::render::{ResizeMode, SlotRange};
use armature_engine::window::{Runtime, RuntimeConfig};

use rig::Rig;

/// Pan and zoom gathered by the input listener, applied in `update`.
#[derive(Default)]
struct CameraGesture {
    last: Option<Vec2>,
    /// Screen-space pan since the last update.
    pan: Vec2,
    zoom: f32,
    pinch_zoom: Option<f32>,
}

struct CameraListener(Rc<RefCell<CameraGesture>>);

impl InputListener for CameraListener {
    fn down(&mut self, x: f32, y: f32) {
        self.0.borrow_mut().last = Some(Vec2::new(x, y));
    }

    fn up(&mut self, _x: f32, _y: f32) {
        self.0.borrow_mut().last = None;
    }

    fn dragged(&mut self, x: f32, y: f32) {
        let mut g = self.0.borrow_mut();
        let p = Vec2::new(x, y);
        if let Some(last) = g.last.replace(p) {
            g.pan += p - last;
        }
    }

    fn wheel(&mut self, delta: f32) {
        let mut g = self.0.borrow_mut();
        g.zoom *= 1.0 + delta.signum() * 0.1;
    }

    fn zoom(&mut self, initial: f32, distance: f32) {
        if initial > 0.0 && distance > 0.0 {
            self.0.borrow_mut().pinch_zoom = Some(initial / distance);
        }
    }
}

struct Studio {
    rig: Option<Rig>,
    gesture: Rc<RefCell<CameraGesture>>,
    pinch_base: Option<f32>,
    time: f32,
}

impl Studio {
    fn new() -> Self {
        Self {
            rig: None,
            gesture: Rc::new(RefCell::new(CameraGesture {
                zoom: 1.0,
                ..CameraGesture::default()
            })),
            pinch_base: None,
            time: 0.0,
        }
    }
}

impl CanvasApp for Studio {
    fn load_assets(&mut self, canvas: &mut Canvas) -> Result<()> {
        self.rig = Some(Rig::new(&mut canvas.context, Vec2::new(0.0, -200.0))?);
        Ok(())
    }

    fn initialize(&mut self, canvas: &mut Canvas) -> Result<()> {
        canvas
            .input
            .add_listener(Box::new(CameraListener(self.gesture.clone())));
        log::info!("studio ready: drag to pan, scroll or pinch to zoom");
        Ok(())
    }

    fn update(&mut self, canvas: &mut Canvas, delta: f32) {
        self.time += delta;
        if let Some(rig) = self.rig.as_mut() {
            rig.pose(self.time);
        }

        let camera = &mut canvas.renderer.camera;
        let mut g = self.gesture.borrow_mut();

        // Screen y grows downwards, world y upwards.
        let pan = std::mem::take(&mut g.pan) * camera.zoom;
        camera.position += Vec3::new(-pan.x, pan.y, 0.0);

        camera.zoom = (camera.zoom * std::mem::replace(&mut g.zoom, 1.0)).clamp(0.1, 10.0);
        match g.pinch_zoom.take() {
            Some(ratio) => {
                let base = *self.pinch_base.get_or_insert(camera.zoom);
                camera.zoom = (base * ratio).clamp(0.1, 10.0);
            }
            None if g.last.is_none() => self.pinch_base = None,
            None => {}
        }
    }

    fn render(&mut self, canvas: &mut Canvas) -> Result<()> {
        let rig = self.rig.as_ref().context("rig not loaded")?;

        canvas.clear(0.12, 0.12, 0.14, 1.0);
        canvas.resize_renderer(ResizeMode::Expand);

        let Canvas { context: ctx, renderer, .. } = canvas;
        renderer.begin(ctx)?;

        renderer.draw_texture(ctx, rig.texture(), -420.0, 120.0, 128.0, 128.0, None)?;
        renderer.draw_texture_rotated(
            ctx,
            rig.texture(),
            -240.0,
            120.0,
            128.0,
            128.0,
            Vec2::splat(64.0),
            self.time * 45.0,
            Some(Color::new(0.6, 0.8, 1.0, 1.0)),
        )?;

        renderer.draw_skeleton(ctx, rig, false, SlotRange::ALL, None)?;
        renderer.draw_skeleton_debug(ctx, rig, false, &["head"])?;

        renderer.rect(ctx, false, -500.0, -300.0, 1000.0, 600.0, Some(Color::MAGENTA))?;
        renderer.circle(ctx, true, Vec2::new(300.0, 150.0), 40.0, Some(Color::RED), 0)?;
        renderer.curve(
            ctx,
            Vec2::new(200.0, -200.0),
            Vec2::new(260.0, 0.0),
            Vec2::new(380.0, -300.0),
            Vec2::new(440.0, -100.0),
            24,
            Some(Color::BLUE),
        )?;

        renderer.end(ctx)?;
        Ok(())
    }

    fn dispose(&mut self, canvas: &mut Canvas) {
        if let Some(rig) = self.rig.take() {
            rig.dispose(&mut canvas.context);
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "Armature Studio".to_string(),
            ..RuntimeConfig::default()
        },
        Studio::new(),
    )
}
