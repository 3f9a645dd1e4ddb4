use super::listener::{InputListener, ListenerId};
use super::types::{InputEvent, Touch, TouchPoint};

/// Pointer and touch state for one drawable, plus its listeners.
///
/// [`handle`](Self::handle) updates the state and calls the listeners in
/// registration order. Mouse and touch share `mouse_x`/`mouse_y` and the
/// button flag; at most two touches are tracked.
#[derive(Default)]
pub struct Input {
    mouse_x: f32,
    mouse_y: f32,
    button_down: bool,
    touch0: Option<Touch>,
    touch1: Option<Touch>,
    initial_pinch_distance: f32,

    listeners: Vec<(ListenerId, Box<dyn InputListener>)>,
    next_id: u64,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn InputListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregisters and returns a listener. `None` if `id` is unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn InputListener>> {
        let idx = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.remove(idx).1)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn mouse_x(&self) -> f32 {
        self.mouse_x
    }

    pub fn mouse_y(&self) -> f32 {
        self.mouse_y
    }

    pub fn mouse_position(&self) -> (f32, f32) {
        (self.mouse_x, self.mouse_y)
    }

    pub fn button_down(&self) -> bool {
        self.button_down
    }

    pub fn touch0(&self) -> Option<Touch> {
        self.touch0
    }

    pub fn touch1(&self) -> Option<Touch> {
        self.touch1
    }

    pub fn initial_pinch_distance(&self) -> f32 {
        self.initial_pinch_distance
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn InputListener)) {
        for (_, listener) in &mut self.listeners {
            f(listener.as_mut());
        }
    }

    /// Applies one event and notifies the listeners.
    pub fn handle(&mut self, event: &InputEvent) {
        match event {
            InputEvent::MouseDown { x, y } => {
                let (x, y) = (*x, *y);
                self.mouse_x = x;
                self.mouse_y = y;
                self.button_down = true;
                self.each(|l| l.down(x, y));
            }
            InputEvent::MouseMove { x, y } => {
                let (x, y) = (*x, *y);
                self.mouse_x = x;
                self.mouse_y = y;
                if self.button_down {
                    self.each(|l| l.dragged(x, y));
                } else {
                    self.each(|l| l.moved(x, y));
                }
            }
            InputEvent::MouseUp { x, y } => {
                let (x, y) = (*x, *y);
                self.mouse_x = x;
                self.mouse_y = y;
                self.button_down = false;
                self.each(|l| l.up(x, y));
            }
            InputEvent::Wheel { delta_y } => {
                let delta = *delta_y;
                self.each(|l| l.wheel(delta));
            }
            InputEvent::TouchStart(touches) => self.touch_start(touches),
            InputEvent::TouchMove(touches) => self.touch_move(touches),
            InputEvent::TouchEnd(touches) | InputEvent::TouchCancel(touches) => {
                self.touch_end(touches)
            }
        }
    }

    /// Pinch distance between the tracked touches.
    ///
    /// Known defect kept for behavioral compatibility: both deltas are taken
    /// on the x axis, so vertical pinches report zero.
    fn pinch_distance(t0: Touch, t1: Touch) -> f32 {
        let dx = t1.x - t0.x;
        let dy = t1.x - t0.x;
        (dx * dx + dy * dy).sqrt()
    }

    fn touch_start(&mut self, touches: &[TouchPoint]) {
        if self.touch0.is_some() && self.touch1.is_some() {
            return;
        }
        // Only the first changed touch is considered.
        let Some(&point) = touches.first() else {
            return;
        };
        let touch = Touch::from(point);
        self.mouse_x = touch.x;
        self.mouse_y = touch.y;
        self.button_down = true;

        match self.touch0 {
            None => {
                self.touch0 = Some(touch);
                self.each(|l| l.down(touch.x, touch.y));
            }
            Some(t0) => {
                self.touch1 = Some(touch);
                let initial = Self::pinch_distance(t0, touch);
                self.initial_pinch_distance = initial;
                self.each(|l| l.zoom(initial, initial));
            }
        }
    }

    fn touch_move(&mut self, touches: &[TouchPoint]) {
        if self.touch0.is_none() {
            return;
        }
        for point in touches {
            let (x, y) = (point.x, point.y);
            if let Some(t0) = self.touch0.as_mut().filter(|t| t.identifier == point.identifier) {
                t0.x = x;
                t0.y = y;
                self.mouse_x = x;
                self.mouse_y = y;
                self.each(|l| l.dragged(x, y));
            }
            if let Some(t1) = self.touch1.as_mut().filter(|t| t.identifier == point.identifier) {
                t1.x = x;
                t1.y = y;
                self.mouse_x = x;
                self.mouse_y = y;
            }
        }
        if let (Some(t0), Some(t1)) = (self.touch0, self.touch1) {
            let initial = self.initial_pinch_distance;
            let distance = Self::pinch_distance(t0, t1);
            self.each(|l| l.zoom(initial, distance));
        }
    }

    fn touch_end(&mut self, touches: &[TouchPoint]) {
        if self.touch0.is_none() {
            return;
        }
        for point in touches {
            let (x, y) = (point.x, point.y);
            if self.touch0.is_some_and(|t| t.identifier == point.identifier) {
                self.touch0 = None;
                self.mouse_x = x;
                self.mouse_y = y;
                self.each(|l| l.up(x, y));

                match self.touch1.take() {
                    None => {
                        self.button_down = false;
                        break;
                    }
                    Some(t1) => {
                        // The second touch takes over; mouse_y keeps the lifted
                        // touch's position.
                        self.touch0 = Some(t1);
                        self.mouse_x = t1.x;
                        self.button_down = true;
                        self.each(|l| l.down(t1.x, t1.y));
                    }
                }
            }
            // Any changed touch releases the second touch unless its id is 0.
            if self.touch1.is_some_and(|t| t.identifier != 0) {
                self.touch1 = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Down(f32, f32),
        Up(f32, f32),
        Moved(f32, f32),
        Dragged(f32, f32),
        Wheel(f32),
        Zoom(f32, f32),
    }

    struct Recorder(Rc<RefCell<Vec<Call>>>);

    impl InputListener for Recorder {
        fn down(&mut self, x: f32, y: f32) {
            self.0.borrow_mut().push(Call::Down(x, y));
        }
        fn up(&mut self, x: f32, y: f32) {
            self.0.borrow_mut().push(Call::Up(x, y));
        }
        fn moved(&mut self, x: f32, y: f32) {
            self.0.borrow_mut().push(Call::Moved(x, y));
        }
        fn dragged(&mut self, x: f32, y: f32) {
            self.0.borrow_mut().push(Call::Dragged(x, y));
        }
        fn wheel(&mut self, delta: f32) {
            self.0.borrow_mut().push(Call::Wheel(delta));
        }
        fn zoom(&mut self, initial: f32, distance: f32) {
            self.0.borrow_mut().push(Call::Zoom(initial, distance));
        }
    }

    fn recording() -> (Input, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut input = Input::new();
        input.add_listener(Box::new(Recorder(calls.clone())));
        (input, calls)
    }

    fn touch(id: u64, x: f32, y: f32) -> Vec<TouchPoint> {
        vec![TouchPoint::new(id, x, y)]
    }

    #[test]
    fn mouse_move_is_drag_only_while_down() {
        let (mut input, calls) = recording();
        input.handle(&InputEvent::MouseMove { x: 1.0, y: 2.0 });
        input.handle(&InputEvent::MouseDown { x: 3.0, y: 4.0 });
        input.handle(&InputEvent::MouseMove { x: 5.0, y: 6.0 });
        input.handle(&InputEvent::MouseUp { x: 7.0, y: 8.0 });
        input.handle(&InputEvent::Wheel { delta_y: -3.0 });

        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Moved(1.0, 2.0),
                Call::Down(3.0, 4.0),
                Call::Dragged(5.0, 6.0),
                Call::Up(7.0, 8.0),
                Call::Wheel(-3.0),
            ]
        );
        assert_eq!(input.mouse_position(), (7.0, 8.0));
        assert!(!input.button_down());
    }

    #[test]
    fn pinch_distance_uses_x_axis_twice() {
        let (mut input, calls) = recording();
        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(2, 3.0, 4.0)));

        // dx = dy = 3 instead of (3, 4).
        let initial = (18.0f32).sqrt();
        assert_eq!(input.initial_pinch_distance(), initial);

        // A purely vertical move of the second touch does not change the distance.
        input.handle(&InputEvent::TouchMove(touch(2, 3.0, 40.0)));
        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Down(0.0, 0.0),
                Call::Zoom(initial, initial),
                Call::Zoom(initial, initial),
            ]
        );
        assert_eq!(input.mouse_position(), (3.0, 40.0));
    }

    #[test]
    fn first_touch_move_drags() {
        let (mut input, calls) = recording();
        input.handle(&InputEvent::TouchMove(touch(1, 9.0, 9.0)));
        assert!(calls.borrow().is_empty());

        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchMove(touch(1, 2.0, 5.0)));
        assert_eq!(calls.borrow().last(), Some(&Call::Dragged(2.0, 5.0)));
        assert_eq!(input.touch0().map(|t| (t.x, t.y)), Some((2.0, 5.0)));
    }

    #[test]
    fn third_touch_is_ignored() {
        let (mut input, calls) = recording();
        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(2, 1.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(3, 50.0, 50.0)));
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(input.mouse_position(), (1.0, 0.0));
    }

    #[test]
    fn lifting_first_touch_promotes_second() {
        let (mut input, calls) = recording();
        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(2, 10.0, 20.0)));
        calls.borrow_mut().clear();

        input.handle(&InputEvent::TouchEnd(touch(1, 1.0, 2.0)));
        assert_eq!(*calls.borrow(), vec![Call::Up(1.0, 2.0), Call::Down(10.0, 20.0)]);
        assert_eq!(input.touch0().map(|t| t.identifier), Some(2));
        assert_eq!(input.touch1(), None);
        assert!(input.button_down());
        // Only x follows the promoted touch.
        assert_eq!(input.mouse_position(), (10.0, 2.0));

        input.handle(&InputEvent::TouchCancel(touch(2, 11.0, 21.0)));
        assert_eq!(calls.borrow().last(), Some(&Call::Up(11.0, 21.0)));
        assert_eq!(input.touch0(), None);
        assert!(!input.button_down());
    }

    #[test]
    fn unrelated_end_drops_second_touch_unless_id_zero() {
        let (mut input, _) = recording();
        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(2, 1.0, 1.0)));
        input.handle(&InputEvent::TouchEnd(touch(7, 0.0, 0.0)));
        assert_eq!(input.touch1(), None);
        assert!(input.touch0().is_some());

        let (mut input, _) = recording();
        input.handle(&InputEvent::TouchStart(touch(1, 0.0, 0.0)));
        input.handle(&InputEvent::TouchStart(touch(0, 1.0, 1.0)));
        input.handle(&InputEvent::TouchEnd(touch(0, 1.0, 1.0)));
        assert_eq!(input.touch1().map(|t| t.identifier), Some(0));
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut input = Input::new();
        let a = input.add_listener(Box::new(Recorder(calls.clone())));
        let _b = input.add_listener(Box::new(Recorder(calls.clone())));

        input.handle(&InputEvent::MouseDown { x: 0.0, y: 0.0 });
        assert_eq!(calls.borrow().len(), 2);

        assert!(input.remove_listener(a).is_some());
        assert!(input.remove_listener(a).is_none());
        input.handle(&InputEvent::MouseUp { x: 0.0, y: 0.0 });
        assert_eq!(calls.borrow().len(), 3);
        assert_eq!(input.listener_count(), 1);
    }
}
