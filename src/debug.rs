use crate::math::{Point2d, Rect};
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[cfg(feature = "debug")]
fn push(value: serde_json::Value) {
    DEBUG_FRAME.with(|frame| frame.borrow_mut().push(value));
}

/// Records a line segment in the current debug frame.
#[allow(unused)]
pub fn debug_line(name: &str, p1: Point2d, p2: Point2d) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "line",
        "name": name,
        "p1": [p1.x, p1.y],
        "p2": [p2.x, p2.y],
    }));
}

/// Records an axis-aligned box in the current debug frame.
#[allow(unused)]
pub fn debug_rect(name: &str, rect: &Rect) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "rect",
        "name": name,
        "origin": [rect.x, rect.y],
        "size": [rect.width, rect.height],
    }));
}

/// Records a labelled point in the current debug frame.
#[allow(unused)]
pub fn debug_point(name: &str, point: Point2d) {
    #[cfg(feature = "debug")]
    push(json!({
        "type": "point",
        "name": name,
        "pos": [point.x, point.y],
    }));
}

/// Takes everything recorded since the last call.
#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
