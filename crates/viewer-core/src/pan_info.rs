use serde::{Deserialize, Serialize};

/// Edge tolerance in view pixels.
pub const DEFAULT_EDGE_TOLERANCE: f32 = 3.0;

/// Distance in view pixels between each image edge and the matching
/// viewport edge. Zero on an axis means the image is flush with that side,
/// which is what a hosting scroll container needs to decide whether a drag
/// belongs to the image or to itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanInfo {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub horizontal_tolerance: f32,
    pub vertical_tolerance: f32,
}

impl PanInfo {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            horizontal_tolerance: DEFAULT_EDGE_TOLERANCE,
            vertical_tolerance: DEFAULT_EDGE_TOLERANCE,
        }
    }

    pub fn touches_left(&self) -> bool {
        self.left.abs() < self.horizontal_tolerance
    }

    pub fn touches_right(&self) -> bool {
        self.right.abs() < self.horizontal_tolerance
    }

    pub fn touches_top(&self) -> bool {
        self.top.abs() < self.vertical_tolerance
    }

    pub fn touches_bottom(&self) -> bool {
        self.bottom.abs() < self.vertical_tolerance
    }

    pub fn touches_left_and_right(&self) -> bool {
        self.touches_left() && self.touches_right()
    }

    pub fn touches_top_and_bottom(&self) -> bool {
        self.touches_top() && self.touches_bottom()
    }

    pub fn touches_all_sides(&self) -> bool {
        self.touches_left_and_right() && self.touches_top_and_bottom()
    }
}

/// Scroll axis of an enclosing container, if the viewport lives inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// True when a drag should be left to the container: the image already
    /// spans the container's scroll axis edge to edge.
    pub fn yields_to_container(&self, info: &PanInfo) -> bool {
        match self {
            Axis::Horizontal => info.touches_left_and_right(),
            Axis::Vertical => info.touches_top_and_bottom(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_is_exclusive() {
        let info = PanInfo::new(2.9, 3.0, -2.0, 10.0);

        assert!(info.touches_left());
        assert!(!info.touches_top());
        assert!(info.touches_right());
        assert!(!info.touches_bottom());
        assert!(info.touches_left_and_right());
        assert!(!info.touches_all_sides());
    }

    #[test]
    fn container_axis_selects_edge_pair() {
        let fitted_width = PanInfo::new(0.0, -300.0, 0.0, 500.0);

        assert!(Axis::Horizontal.yields_to_container(&fitted_width));
        assert!(!Axis::Vertical.yields_to_container(&fitted_width));
    }
}
