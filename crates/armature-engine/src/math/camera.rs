use glam::{Mat4, Vec3};

/// Orthographic camera centered on `position`.
///
/// Call [`update`](Self::update) after changing any field; the matrices are
/// not recomputed implicitly.
#[derive(Debug, Clone)]
pub struct OrthoCamera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,

    projection: Mat4,
    view: Mat4,
    projection_view: Mat4,
    inverse_projection_view: Mat4,
}

impl OrthoCamera {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            near: 0.0,
            far: 100.0,
            zoom: 1.0,
            viewport_width,
            viewport_height,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection_view: Mat4::IDENTITY,
            inverse_projection_view: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    /// Recomputes projection, view and their combined matrix and inverse.
    pub fn update(&mut self) {
        let half_w = self.zoom * self.viewport_width / 2.0;
        let half_h = self.zoom * self.viewport_height / 2.0;
        self.projection =
            Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, self.near, self.far);
        self.view = Mat4::look_to_rh(self.position, self.direction, self.up);
        self.projection_view = self.projection * self.view;
        self.inverse_projection_view = self.projection_view.inverse();
    }

    /// Sets the viewport size. Takes effect on the next [`update`](Self::update).
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection_view(&self) -> Mat4 {
        self.projection_view
    }

    pub fn inverse_projection_view(&self) -> Mat4 {
        self.inverse_projection_view
    }

    /// Unprojects a screen point (top-left origin, `z` in `[0, 1]`) to world space.
    pub fn screen_to_world(&self, screen: Vec3, screen_width: f32, screen_height: f32) -> Vec3 {
        let x = screen.x;
        let y = screen_height - screen.y - 1.0;
        let ndc = Vec3::new(
            2.0 * x / screen_width - 1.0,
            2.0 * y / screen_height - 1.0,
            2.0 * screen.z - 1.0,
        );
        self.inverse_projection_view.project_point3(ndc)
    }

    /// Projects a world point to screen space.
    ///
    /// The result has a bottom-left origin: unlike [`screen_to_world`](Self::screen_to_world),
    /// y is not flipped.
    pub fn world_to_screen(&self, world: Vec3, screen_width: f32, screen_height: f32) -> Vec3 {
        let ndc = self.projection_view.project_point3(world);
        Vec3::new(
            screen_width * (ndc.x + 1.0) / 2.0,
            screen_height * (ndc.y + 1.0) / 2.0,
            (ndc.z + 1.0) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn origin_maps_to_viewport_center() {
        let camera = OrthoCamera::new(800.0, 600.0);
        let screen = camera.world_to_screen(Vec3::ZERO, 800.0, 600.0);
        // z = 0 sits on the near plane.
        assert!(close(screen, Vec3::new(400.0, 300.0, 0.0)), "{screen:?}");
    }

    #[test]
    fn screen_to_world_flips_y() {
        let mut camera = OrthoCamera::new(800.0, 600.0);
        camera.position = Vec3::new(100.0, 50.0, 0.0);
        camera.update();

        // Top-left pixel lands in the upper-left corner of the view.
        let world = camera.screen_to_world(Vec3::new(0.0, 0.0, 0.0), 800.0, 600.0);
        assert!(close(world, Vec3::new(-300.0, 349.0, 0.0)), "{world:?}");
    }

    #[test]
    fn round_trip_through_screen_space() {
        let mut camera = OrthoCamera::new(640.0, 480.0);
        camera.zoom = 2.0;
        camera.position = Vec3::new(-20.0, 35.0, 0.0);
        camera.update();

        let world = Vec3::new(37.0, -12.0, 0.0);
        let screen = camera.world_to_screen(world, 640.0, 480.0);
        // world_to_screen yields a bottom-left origin; convert before unprojecting.
        let top_left = Vec3::new(screen.x, 480.0 - screen.y - 1.0, screen.z);
        let back = camera.screen_to_world(top_left, 640.0, 480.0);
        assert!(close(back, world), "{back:?}");
    }

    #[test]
    fn zoom_scales_visible_extent() {
        let mut camera = OrthoCamera::new(100.0, 100.0);
        camera.zoom = 2.0;
        camera.update();
        let edge = camera.world_to_screen(Vec3::new(100.0, 0.0, 0.0), 100.0, 100.0);
        assert!((edge.x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn set_viewport_waits_for_update() {
        let mut camera = OrthoCamera::new(100.0, 100.0);
        let before = camera.projection_view();
        camera.set_viewport(200.0, 50.0);
        assert_eq!(camera.projection_view(), before);
        camera.update();
        assert_ne!(camera.projection_view(), before);
        assert!(close(
            (camera.projection_view() * camera.inverse_projection_view()).transform_point3(Vec3::ONE),
            Vec3::ONE
        ));
    }
}
