/// One changed touch point, in logical pixels relative to the drawable.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TouchPoint {
    pub identifier: u64,
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(identifier: u64, x: f32, y: f32) -> Self {
        Self { identifier, x, y }
    }
}

/// A tracked touch. Same shape as [`TouchPoint`]; kept separate so tracked
/// state never aliases incoming event data.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Touch {
    pub identifier: u64,
    pub x: f32,
    pub y: f32,
}

impl From<TouchPoint> for Touch {
    fn from(p: TouchPoint) -> Self {
        Self {
            identifier: p.identifier,
            x: p.x,
            y: p.y,
        }
    }
}

/// Platform-agnostic input events.
///
/// Coordinates are logical pixels with a top-left origin. Touch events carry
/// the touches that changed, in platform order.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseDown { x: f32, y: f32 },
    MouseMove { x: f32, y: f32 },
    MouseUp { x: f32, y: f32 },

    /// Vertical wheel delta, positive when scrolling down. Passed through unscaled.
    Wheel { delta_y: f32 },

    TouchStart(Vec<TouchPoint>),
    TouchMove(Vec<TouchPoint>),
    TouchEnd(Vec<TouchPoint>),
    TouchCancel(Vec<TouchPoint>),
}
