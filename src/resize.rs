use crate::columns::ColumnPreferences;

pub const DEFAULT_MIN_WIDTH: f64 = 80.0;

/// The rendered header row a drag acts on.
///
/// Previews only touch the surface. Nothing is persisted until the drag ends.
pub trait HeaderSurface {
    fn rendered_width(&self, key: &str) -> Option<f64>;
    fn preview_width(&mut self, key: &str, width: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDrag {
    pub key: String,
    pub start_x: f64,
    pub start_width: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

#[derive(Debug, Clone)]
pub struct ColumnResizer {
    state: DragState,
    min_width: f64,
}

impl Default for ColumnResizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WIDTH)
    }
}

impl ColumnResizer {
    pub fn new(min_width: f64) -> Self {
        let min_width = if min_width.is_finite() && min_width > 0.0 {
            min_width
        } else {
            DEFAULT_MIN_WIDTH
        };
        Self {
            state: DragState::Idle,
            min_width,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Start dragging the right edge of `key`'s header.
    ///
    /// Returns false, leaving the state untouched, while another drag is
    /// active or when the header has no rendered width for `key`.
    pub fn begin(&mut self, key: &str, x: f64, header: &impl HeaderSurface) -> bool {
        if let DragState::Dragging(active) = &self.state {
            tracing::debug!(active = %active.key, requested = key, "Resize already in progress");
            return false;
        }
        let Some(start_width) = header.rendered_width(key) else {
            return false;
        };
        tracing::trace!(key, x, start_width, "Resize started");
        self.state = DragState::Dragging(ActiveDrag {
            key: key.to_string(),
            start_x: x,
            start_width,
        });
        true
    }

    /// Preview the width under the pointer. Returns the previewed width.
    pub fn pointer_moved(&self, x: f64, header: &mut impl HeaderSurface) -> Option<f64> {
        let DragState::Dragging(active) = &self.state else {
            return None;
        };
        let width = self.width_at(active, x);
        header.preview_width(&active.key, width);
        Some(width)
    }

    /// Release the pointer and commit the final width. Returns the committed
    /// width, or `None` when no drag was active or the store refused it.
    pub fn end(&mut self, x: f64, prefs: &mut ColumnPreferences) -> Option<f64> {
        let DragState::Dragging(active) = std::mem::take(&mut self.state) else {
            return None;
        };
        let width = self.width_at(&active, x).floor();
        if !prefs.set_width(&active.key, width) {
            return None;
        }
        tracing::debug!(key = %active.key, width, "Resize committed");
        Some(width)
    }

    /// Drop the drag without committing anything.
    pub fn abandon(&mut self) {
        if let DragState::Dragging(active) = std::mem::take(&mut self.state) {
            tracing::trace!(key = %active.key, "Resize abandoned");
        }
    }

    fn width_at(&self, active: &ActiveDrag, x: f64) -> f64 {
        (active.start_width + (x - active.start_x)).max(self.min_width)
    }
}
