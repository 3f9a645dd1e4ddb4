use anyhow::Result;

use super::canvas::Canvas;

/// Application contract driven by [`CanvasHost`](super::CanvasHost).
///
/// Every callback has a default, so an app only implements what it needs.
pub trait CanvasApp {
    /// Creates textures and other resources. An error skips `initialize`
    /// and is reported through [`error`](Self::error).
    fn load_assets(&mut self, canvas: &mut Canvas) -> Result<()> {
        let _ = canvas;
        Ok(())
    }

    /// Called once after assets loaded successfully.
    fn initialize(&mut self, canvas: &mut Canvas) -> Result<()> {
        let _ = canvas;
        Ok(())
    }

    /// Advances the simulation by `delta` seconds (already clamped).
    fn update(&mut self, canvas: &mut Canvas, delta: f32) {
        let _ = (canvas, delta);
    }

    fn render(&mut self, canvas: &mut Canvas) -> Result<()> {
        let _ = canvas;
        Ok(())
    }

    /// Loading or initialization failed; the app will not run.
    fn error(&mut self, canvas: &mut Canvas, error: &anyhow::Error) {
        let _ = canvas;
        log::error!("canvas app failed to start: {error:#}");
    }

    fn dispose(&mut self, canvas: &mut Canvas) {
        let _ = canvas;
    }
}
