//! Zoom/pan state machine for the single-image lightbox.
//!
//! Pure: the GTK overlay feeds it pointer and key events and applies the
//! returned [`ViewerEffect`].

/// Maximum zoom scale allowed
pub const MAX_ZOOM: f64 = 5.0;
/// Minimum zoom scale allowed
pub const MIN_ZOOM: f64 = 0.25;
/// Zoom factor for the +/- buttons and PageUp/PageDown
const BUTTON_ZOOM_STEP: f64 = 1.25;
/// Zoom factor per wheel notch
const WHEEL_ZOOM_STEP: f64 = 1.2;
/// Soft bound on drag panning in each axis, in pixels
const MAX_PAN: f64 = 200.0;

const SHORTCUTS_HELP: &str = "Keyboard Shortcuts in Expanded Image View:

Navigation:
  Esc - Close expanded view
  Alt + Left / Right - Previous/Next image

Zoom Controls:
  Page Up - Zoom in
  Page Down - Zoom out
  Enter - Reset zoom to 100%
  Home / End - Reset zoom to 100%

Mouse Controls:
  Mouse wheel - Zoom in/out at cursor position
  Click & drag - Pan when zoomed in
  Double-click on image - Close expanded view

To disable these shortcuts:
  Settings > Enable keyboard shortcuts in expanded view";

const SHORTCUTS_DISABLED_HELP: &str = "Keyboard shortcuts are currently disabled in Settings.

To enable: Settings > Enable keyboard shortcuts in expanded view";

/// Current zoom and pan of the expanded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPan {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl ZoomPan {
    pub const IDENTITY: ZoomPan = ZoomPan {
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };
}

impl Default for ZoomPan {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Keys the expanded view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    Escape,
    Enter,
    PageUp,
    PageDown,
    Home,
    End,
    Left,
    Right,
}

/// What the overlay has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEffect {
    None,
    /// Show image `index` with an identity transform.
    Load(usize),
    /// Re-apply the zoom/pan transform.
    Transform,
    Hide,
}

#[derive(Debug, Clone)]
pub struct ExpandedView {
    visible: bool,
    index: usize,
    count: usize,
    zoom_pan: ZoomPan,
    drag_last: Option<(f64, f64)>,
    shortcuts_enabled: bool,
}

impl ExpandedView {
    pub fn new(shortcuts_enabled: bool) -> Self {
        Self {
            visible: false,
            index: 0,
            count: 0,
            zoom_pan: ZoomPan::IDENTITY,
            drag_last: None,
            shortcuts_enabled,
        }
    }

    pub fn set_shortcuts_enabled(&mut self, enabled: bool) {
        self.shortcuts_enabled = enabled;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn zoom_pan(&self) -> ZoomPan {
        self.zoom_pan
    }

    pub fn show(&mut self, index: usize, count: usize) -> ViewerEffect {
        if index >= count {
            return ViewerEffect::None;
        }
        self.visible = true;
        self.count = count;
        self.index = index;
        self.zoom_pan = ZoomPan::IDENTITY;
        self.drag_last = None;
        ViewerEffect::Load(index)
    }

    pub fn hide(&mut self) -> ViewerEffect {
        if !self.visible {
            return ViewerEffect::None;
        }
        self.visible = false;
        self.drag_last = None;
        ViewerEffect::Hide
    }

    /// Move by `delta` images; out-of-range targets are ignored, no wrapping.
    pub fn navigate(&mut self, delta: isize) -> ViewerEffect {
        if !self.visible {
            return ViewerEffect::None;
        }
        match self.index.checked_add_signed(delta) {
            Some(target) if target < self.count => self.show(target, self.count),
            _ => ViewerEffect::None,
        }
    }

    pub fn can_go_previous(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.index + 1 < self.count
    }

    pub fn zoom_in(&mut self) -> ViewerEffect {
        self.set_zoom(self.zoom_pan.zoom * BUTTON_ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> ViewerEffect {
        self.set_zoom(self.zoom_pan.zoom / BUTTON_ZOOM_STEP)
    }

    pub fn reset_zoom(&mut self) -> ViewerEffect {
        self.zoom_pan = ZoomPan::IDENTITY;
        ViewerEffect::Transform
    }

    fn set_zoom(&mut self, zoom: f64) -> ViewerEffect {
        self.zoom_pan.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        ViewerEffect::Transform
    }

    /// Wheel zoom anchored at `pointer`, keeping the point under the cursor fixed.
    ///
    /// `pointer` and `viewport` are in the image container's coordinate space;
    /// positive `dy` (scrolling down) zooms out.
    pub fn wheel(&mut self, dy: f64, pointer: (f64, f64), viewport: (f64, f64)) -> ViewerEffect {
        if dy == 0.0 || !dy.is_finite() {
            return ViewerEffect::None;
        }
        let factor = if dy > 0.0 {
            1.0 / WHEEL_ZOOM_STEP
        } else {
            WHEEL_ZOOM_STEP
        };
        let old_zoom = self.zoom_pan.zoom;
        let new_zoom = (old_zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = new_zoom / old_zoom;

        let offset_x = pointer.0 - viewport.0 / 2.0;
        let offset_y = pointer.1 - viewport.1 / 2.0;

        self.zoom_pan = ZoomPan {
            zoom: new_zoom,
            pan_x: (self.zoom_pan.pan_x - offset_x) * ratio + offset_x,
            pan_y: (self.zoom_pan.pan_y - offset_y) * ratio + offset_y,
        };
        ViewerEffect::Transform
    }

    /// Start a pan drag. Refused unless zoomed in past 100%.
    pub fn drag_begin(&mut self, x: f64, y: f64) -> bool {
        if !self.visible || self.zoom_pan.zoom <= 1.0 {
            return false;
        }
        self.drag_last = Some((x, y));
        true
    }

    pub fn drag_motion(&mut self, x: f64, y: f64) -> ViewerEffect {
        let Some((last_x, last_y)) = self.drag_last else {
            return ViewerEffect::None;
        };
        self.zoom_pan.pan_x += x - last_x;
        self.zoom_pan.pan_y += y - last_y;
        self.constrain_pan();
        self.drag_last = Some((x, y));
        ViewerEffect::Transform
    }

    pub fn drag_end(&mut self) {
        self.drag_last = None;
    }

    fn constrain_pan(&mut self) {
        if self.zoom_pan.zoom <= 1.0 {
            self.zoom_pan.pan_x = 0.0;
            self.zoom_pan.pan_y = 0.0;
            return;
        }
        self.zoom_pan.pan_x = self.zoom_pan.pan_x.clamp(-MAX_PAN, MAX_PAN);
        self.zoom_pan.pan_y = self.zoom_pan.pan_y.clamp(-MAX_PAN, MAX_PAN);
    }

    /// Keyboard handling. Returns `None` when the key is not consumed, which
    /// is always the case while hidden or with shortcuts disabled.
    pub fn key(&mut self, key: ViewerKey, alt: bool) -> Option<ViewerEffect> {
        if !self.visible || !self.shortcuts_enabled {
            return None;
        }
        match key {
            ViewerKey::Escape => Some(self.hide()),
            ViewerKey::PageUp => Some(self.zoom_in()),
            ViewerKey::PageDown => Some(self.zoom_out()),
            ViewerKey::Enter | ViewerKey::Home | ViewerKey::End if !alt => Some(self.reset_zoom()),
            ViewerKey::Left if alt => Some(self.navigate(-1)),
            ViewerKey::Right if alt => Some(self.navigate(1)),
            _ => None,
        }
    }

    /// `current / total`
    pub fn counter_text(&self) -> String {
        format!("{} / {}", self.index + 1, self.count)
    }

    pub fn zoom_text(&self) -> String {
        format!("{}%", (self.zoom_pan.zoom * 100.0).round() as i64)
    }

    pub fn help_text(&self) -> &'static str {
        if self.shortcuts_enabled {
            SHORTCUTS_HELP
        } else {
            SHORTCUTS_DISABLED_HELP
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown(count: usize) -> ExpandedView {
        let mut view = ExpandedView::new(true);
        view.show(0, count);
        view
    }

    #[test]
    fn zoom_in_is_clamped_at_max() {
        let mut view = shown(1);
        for _ in 0..100 {
            view.zoom_in();
            assert!(view.zoom_pan().zoom <= MAX_ZOOM);
        }
        assert_eq!(view.zoom_pan().zoom, MAX_ZOOM);
    }

    #[test]
    fn zoom_out_is_clamped_at_min() {
        let mut view = shown(1);
        for _ in 0..100 {
            view.zoom_out();
            assert!(view.zoom_pan().zoom >= MIN_ZOOM);
        }
        assert_eq!(view.zoom_pan().zoom, MIN_ZOOM);
    }

    #[test]
    fn wheel_at_center_keeps_pan() {
        let mut view = shown(1);
        view.wheel(-1.0, (400.0, 300.0), (800.0, 600.0));
        let state = view.zoom_pan();
        assert!((state.zoom - 1.2).abs() < 1e-9);
        assert_eq!((state.pan_x, state.pan_y), (0.0, 0.0));
    }

    #[test]
    fn wheel_keeps_point_under_cursor_fixed() {
        let mut view = shown(1);
        let viewport = (800.0, 600.0);
        let pointer = (600.0, 100.0);
        let offset = (pointer.0 - viewport.0 / 2.0, pointer.1 - viewport.1 / 2.0);

        // Content point under the cursor: (offset - pan) / zoom, relative to center.
        let before = view.zoom_pan();
        let anchor = ((offset.0 - before.pan_x) / before.zoom, (offset.1 - before.pan_y) / before.zoom);

        view.wheel(-3.0, pointer, viewport);
        view.wheel(-3.0, pointer, viewport);
        let after = view.zoom_pan();
        let anchor_after = ((offset.0 - after.pan_x) / after.zoom, (offset.1 - after.pan_y) / after.zoom);

        assert!((anchor.0 - anchor_after.0).abs() < 1e-9);
        assert!((anchor.1 - anchor_after.1).abs() < 1e-9);
    }

    #[test]
    fn wheel_down_zooms_out() {
        let mut view = shown(1);
        view.wheel(1.0, (0.0, 0.0), (100.0, 100.0));
        assert!((view.zoom_pan().zoom - 1.0 / 1.2).abs() < 1e-9);
        assert_eq!(view.wheel(0.0, (0.0, 0.0), (100.0, 100.0)), ViewerEffect::None);
    }

    #[test]
    fn drag_requires_zoom_above_one() {
        let mut view = shown(1);
        assert!(!view.drag_begin(10.0, 10.0));
        assert_eq!(view.drag_motion(50.0, 50.0), ViewerEffect::None);
        assert_eq!(view.zoom_pan().pan_x, 0.0);

        view.zoom_in();
        assert!(view.drag_begin(10.0, 10.0));
        view.drag_motion(40.0, 0.0);
        assert_eq!((view.zoom_pan().pan_x, view.zoom_pan().pan_y), (30.0, -10.0));
    }

    #[test]
    fn drag_pan_is_clamped() {
        let mut view = shown(1);
        view.zoom_in();
        view.drag_begin(0.0, 0.0);
        view.drag_motion(1000.0, -1000.0);
        assert_eq!((view.zoom_pan().pan_x, view.zoom_pan().pan_y), (200.0, -200.0));
        view.drag_end();
        assert_eq!(view.drag_motion(5.0, 5.0), ViewerEffect::None);
    }

    #[test]
    fn navigation_is_bounds_checked_and_resets_zoom() {
        let mut view = shown(3);
        assert_eq!(view.navigate(-1), ViewerEffect::None);
        view.zoom_in();
        assert_eq!(view.navigate(1), ViewerEffect::Load(1));
        assert_eq!(view.zoom_pan(), ZoomPan::IDENTITY);
        assert_eq!(view.navigate(1), ViewerEffect::Load(2));
        assert_eq!(view.navigate(1), ViewerEffect::None);
        assert!(!view.can_go_next());
        assert!(view.can_go_previous());
        assert_eq!(view.counter_text(), "3 / 3");
    }

    #[test]
    fn show_resets_zoom_and_rejects_bad_index() {
        let mut view = shown(2);
        view.zoom_in();
        assert_eq!(view.show(1, 2), ViewerEffect::Load(1));
        assert_eq!(view.zoom_pan(), ZoomPan::IDENTITY);
        assert_eq!(view.show(2, 2), ViewerEffect::None);
    }

    #[test]
    fn keyboard_bindings() {
        let mut view = shown(2);
        assert_eq!(view.key(ViewerKey::PageUp, false), Some(ViewerEffect::Transform));
        assert_eq!(view.zoom_text(), "125%");
        assert_eq!(view.key(ViewerKey::Home, false), Some(ViewerEffect::Transform));
        assert_eq!(view.zoom_pan(), ZoomPan::IDENTITY);
        assert_eq!(view.key(ViewerKey::Right, false), None);
        assert_eq!(view.key(ViewerKey::Right, true), Some(ViewerEffect::Load(1)));
        assert_eq!(view.key(ViewerKey::Enter, true), None);
        assert_eq!(view.key(ViewerKey::Escape, false), Some(ViewerEffect::Hide));
        assert!(!view.is_visible());
        assert_eq!(view.key(ViewerKey::PageUp, false), None);
    }

    #[test]
    fn disabled_shortcuts_are_inert() {
        let mut view = shown(2);
        view.set_shortcuts_enabled(false);
        for key in [
            ViewerKey::Escape,
            ViewerKey::PageUp,
            ViewerKey::PageDown,
            ViewerKey::Enter,
            ViewerKey::Right,
        ] {
            assert_eq!(view.key(key, true), None);
            assert_eq!(view.key(key, false), None);
        }
        assert!(view.is_visible());
        assert_eq!(view.zoom_pan(), ZoomPan::IDENTITY);
        assert!(view.help_text().contains("disabled"));
    }
}
