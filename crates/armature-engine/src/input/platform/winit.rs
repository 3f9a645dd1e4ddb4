use ::winit::event::{
    ElementState, MouseButton, MouseScrollDelta, Touch as WinitTouch, TouchPhase, WindowEvent,
};

use crate::input::{Input, InputEvent, TouchPoint};

/// Translates a winit `WindowEvent` into an engine `InputEvent`.
///
/// Positions stay in physical pixels so they line up with the drawable size
/// the camera unprojects against. Only the left mouse button is reported.
/// Returns `None` for events not represented by the input subsystem.
pub fn translate_window_event(input: &Input, event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::MouseMove {
            x: position.x as f32,
            y: position.y as f32,
        }),

        WindowEvent::MouseInput {
            state,
            button: MouseButton::Left,
            ..
        } => {
            // winit 0.30 does not attach a position to button events; use the tracked one.
            let (x, y) = input.mouse_position();
            Some(match state {
                ElementState::Pressed => InputEvent::MouseDown { x, y },
                ElementState::Released => InputEvent::MouseUp { x, y },
            })
        }

        // winit reports "scroll up" as positive y; flip to the down-positive convention.
        WindowEvent::MouseWheel { delta, .. } => {
            let delta_y = match delta {
                MouseScrollDelta::LineDelta(_, y) => -*y,
                MouseScrollDelta::PixelDelta(p) => -(p.y as f32),
            };
            Some(InputEvent::Wheel { delta_y })
        }

        WindowEvent::Touch(touch) => Some(translate_touch(touch)),

        _ => None,
    }
}

fn translate_touch(touch: &WinitTouch) -> InputEvent {
    let points = vec![TouchPoint::new(
        touch.id,
        touch.location.x as f32,
        touch.location.y as f32,
    )];
    match touch.phase {
        TouchPhase::Started => InputEvent::TouchStart(points),
        TouchPhase::Moved => InputEvent::TouchMove(points),
        TouchPhase::Ended => InputEvent::TouchEnd(points),
        TouchPhase::Cancelled => InputEvent::TouchCancel(points),
    }
}
