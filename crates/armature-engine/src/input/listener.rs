/// Receives dispatched input. Every method defaults to a no-op.
pub trait InputListener {
    fn down(&mut self, _x: f32, _y: f32) {}
    fn up(&mut self, _x: f32, _y: f32) {}
    fn moved(&mut self, _x: f32, _y: f32) {}
    fn dragged(&mut self, _x: f32, _y: f32) {}
    fn wheel(&mut self, _delta: f32) {}
    /// Pinch gesture: distance between the two touches when the second one
    /// landed, and the current distance.
    fn zoom(&mut self, _initial_distance: f32, _distance: f32) {}
}

/// Handle returned by [`Input::add_listener`](super::Input::add_listener).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
