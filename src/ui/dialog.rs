// Floating review panel
//
// Lives on the window's "desk" (a gtk4::Fixed). Dragging the header moves it,
// dragging the corner grip resizes it. Everything it shows comes from a
// ReviewView; user intent goes out through the connect_* callbacks.

use gtk4::prelude::*;
use gtk4::{
    Align, Box as GtkBox, Button, Fixed, GestureDrag, Label, Orientation, Widget,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::grid::ImageGrid;
use crate::review::ReviewView;
use crate::storage::{Geometry, Position, Size, Viewport};

/// Horizontal chrome around the grid area
pub const CHROME_WIDTH: f64 = 48.0;
/// Header, controls and padding above and below the grid area
pub const CHROME_HEIGHT: f64 = 140.0;

const MIN_WIDTH: f64 = 300.0;
const MIN_HEIGHT: f64 = 200.0;
/// Part of the header that must stay on the desk
const GRAB_MARGIN: f64 = 40.0;

type Callback = Rc<dyn Fn()>;
type MovedCallback = Rc<dyn Fn(Position)>;
/// Second argument is true once the drag has ended.
type ResizedCallback = Rc<dyn Fn(Size, bool)>;

#[derive(Default)]
struct PanelCallbacks {
    confirm: RefCell<Option<Callback>>,
    cancel: RefCell<Option<Callback>>,
    pin: RefCell<Option<Callback>>,
    close: RefCell<Option<Callback>>,
    moved: RefCell<Option<MovedCallback>>,
    resized: RefCell<Option<ResizedCallback>>,
}

fn fire(slot: &RefCell<Option<Callback>>) {
    let callback = slot.borrow().clone();
    if let Some(callback) = callback {
        callback();
    }
}

/// Keep `position` on the desk with at least the grab margin visible.
pub fn clamp_position(position: Position, desk: Viewport) -> Position {
    let max_x = (desk.width - GRAB_MARGIN).max(0.0);
    let max_y = (desk.height - GRAB_MARGIN).max(0.0);
    Position {
        x: position.x.clamp(0.0, max_x),
        y: position.y.clamp(0.0, max_y),
    }
}

/// Apply the minimum size and the width cap.
pub fn clamp_size(size: Size, max_width: u32) -> Size {
    let max_width = (max_width as f64).max(MIN_WIDTH);
    Size {
        width: size.width.clamp(MIN_WIDTH, max_width),
        height: size.height.max(MIN_HEIGHT),
    }
}

/// Area available to the image grid for a panel of `size`.
pub fn grid_area(size: Size) -> (f32, f32) {
    (
        (size.width - CHROME_WIDTH).max(0.0) as f32,
        (size.height - CHROME_HEIGHT).max(0.0) as f32,
    )
}

pub struct ReviewPanel {
    desk: Fixed,
    root: GtkBox,
    title_label: Label,
    pin_button: Button,
    grid: Rc<ImageGrid>,
    waiting_label: Label,
    selection_label: Label,
    countdown_label: Label,
    confirm_button: Button,
    position: Rc<Cell<Position>>,
    size: Rc<Cell<Size>>,
    max_width: Rc<Cell<u32>>,
    callbacks: Rc<PanelCallbacks>,
}

impl ReviewPanel {
    pub fn new(desk: &Fixed, max_width: u32) -> Rc<Self> {
        let root = GtkBox::new(Orientation::Vertical, 8);
        root.add_css_class("nf-preview-dialog");
        root.set_visible(false);

        // Header: title (drag handle), pin, close
        let header = GtkBox::new(Orientation::Horizontal, 6);
        header.add_css_class("nf-preview-header");
        let title_label = Label::new(Some("NF Preview Selector"));
        title_label.set_hexpand(true);
        title_label.set_halign(Align::Start);
        title_label.add_css_class("nf-preview-title");
        header.append(&title_label);

        let pin_button = Button::with_label("📌");
        pin_button.add_css_class("nf-pin-button");
        header.append(&pin_button);

        let close_button = Button::with_label("×");
        close_button.set_tooltip_text(Some("Close"));
        header.append(&close_button);
        root.append(&header);

        // Body: grid, or the waiting notice while pinned between batches
        let grid = ImageGrid::new();
        root.append(&grid.widget());

        let waiting_label = Label::new(Some("Waiting for next batch…"));
        waiting_label.add_css_class("nf-waiting");
        waiting_label.set_vexpand(true);
        waiting_label.set_visible(false);
        root.append(&waiting_label);

        // Controls
        let controls = GtkBox::new(Orientation::Horizontal, 8);
        controls.add_css_class("nf-preview-controls");
        let selection_label = Label::new(None);
        selection_label.add_css_class("nf-selection-info");
        controls.append(&selection_label);

        let countdown_label = Label::new(None);
        countdown_label.add_css_class("nf-countdown");
        controls.append(&countdown_label);

        let spacer = GtkBox::new(Orientation::Horizontal, 0);
        spacer.set_hexpand(true);
        controls.append(&spacer);

        let cancel_button = Button::with_label("Cancel");
        controls.append(&cancel_button);
        let confirm_button = Button::with_label("Confirm");
        confirm_button.add_css_class("suggested-action");
        controls.append(&confirm_button);
        root.append(&controls);

        let grip = GtkBox::new(Orientation::Horizontal, 0);
        grip.add_css_class("nf-resize-grip");
        grip.set_halign(Align::End);
        grip.set_size_request(14, 14);
        root.append(&grip);

        let callbacks = Rc::new(PanelCallbacks::default());

        let callbacks_clone = callbacks.clone();
        confirm_button.connect_clicked(move |_| fire(&callbacks_clone.confirm));
        let callbacks_clone = callbacks.clone();
        cancel_button.connect_clicked(move |_| fire(&callbacks_clone.cancel));
        let callbacks_clone = callbacks.clone();
        pin_button.connect_clicked(move |_| fire(&callbacks_clone.pin));
        let callbacks_clone = callbacks.clone();
        close_button.connect_clicked(move |_| fire(&callbacks_clone.close));

        let panel = Rc::new(Self {
            desk: desk.clone(),
            root,
            title_label,
            pin_button,
            grid,
            waiting_label,
            selection_label,
            countdown_label,
            confirm_button,
            position: Rc::new(Cell::new(Position { x: 0.0, y: 0.0 })),
            size: Rc::new(Cell::new(Size {
                width: crate::storage::geometry::DEFAULT_WIDTH,
                height: crate::storage::geometry::DEFAULT_HEIGHT,
            })),
            max_width: Rc::new(Cell::new(max_width)),
            callbacks,
        });

        panel.setup_move(&panel.title_label.clone().upcast());
        panel.setup_resize(&grip.upcast());
        panel.desk.put(&panel.root, 0.0, 0.0);
        panel
    }

    fn setup_move(&self, handle: &Widget) {
        let drag = GestureDrag::new();
        let origin = Rc::new(Cell::new(self.position.get()));

        let origin_clone = origin.clone();
        let position = self.position.clone();
        drag.connect_drag_begin(move |_, _, _| {
            origin_clone.set(position.get());
        });

        let origin_clone = origin.clone();
        let position = self.position.clone();
        let desk = self.desk.clone();
        let root = self.root.clone();
        drag.connect_drag_update(move |_, dx, dy| {
            let start = origin_clone.get();
            let viewport = Viewport {
                width: desk.width() as f64,
                height: desk.height() as f64,
            };
            let next = clamp_position(
                Position {
                    x: start.x + dx,
                    y: start.y + dy,
                },
                viewport,
            );
            position.set(next);
            desk.move_(&root, next.x, next.y);
        });

        let position = self.position.clone();
        let callbacks = self.callbacks.clone();
        drag.connect_drag_end(move |_, _, _| {
            let callback = callbacks.moved.borrow().clone();
            if let Some(callback) = callback {
                callback(position.get());
            }
        });

        handle.add_controller(drag);
    }

    fn setup_resize(&self, grip: &Widget) {
        let drag = GestureDrag::new();
        let origin = Rc::new(Cell::new(self.size.get()));

        let origin_clone = origin.clone();
        let size = self.size.clone();
        drag.connect_drag_begin(move |_, _, _| {
            origin_clone.set(size.get());
        });

        let origin_clone = origin.clone();
        let size = self.size.clone();
        let max_width = self.max_width.clone();
        let root = self.root.clone();
        let callbacks = self.callbacks.clone();
        drag.connect_drag_update(move |_, dx, dy| {
            let start = origin_clone.get();
            let next = clamp_size(
                Size {
                    width: start.width + dx,
                    height: start.height + dy,
                },
                max_width.get(),
            );
            size.set(next);
            root.set_size_request(next.width as i32, next.height as i32);
            let callback = callbacks.resized.borrow().clone();
            if let Some(callback) = callback {
                callback(next, false);
            }
        });

        let size = self.size.clone();
        let callbacks = self.callbacks.clone();
        drag.connect_drag_end(move |_, _, _| {
            let callback = callbacks.resized.borrow().clone();
            if let Some(callback) = callback {
                callback(size.get(), true);
            }
        });

        grip.add_controller(drag);
    }

    pub fn grid(&self) -> &Rc<ImageGrid> {
        &self.grid
    }

    /// Show the panel at `geometry`.
    pub fn open(&self, geometry: Geometry) {
        let size = clamp_size(geometry.size, self.max_width.get());
        self.size.set(size);
        self.position.set(geometry.position);
        self.root
            .set_size_request(size.width as i32, size.height as i32);
        self.desk
            .move_(&self.root, geometry.position.x, geometry.position.y);
        self.root.set_visible(true);
    }

    pub fn close(&self) {
        self.root.set_visible(false);
        self.grid.clear();
    }

    /// Size of the area the grid may fill.
    pub fn grid_area(&self) -> (f32, f32) {
        grid_area(self.size.get())
    }

    /// New width cap; an open panel wider than it shrinks.
    pub fn set_max_width(&self, max_width: u32) {
        self.max_width.set(max_width);
        let current = self.size.get();
        let capped = clamp_size(current, max_width);
        if capped != current {
            self.size.set(capped);
            self.root
                .set_size_request(capped.width as i32, capped.height as i32);
        }
    }

    pub fn apply_view(&self, view: &ReviewView) {
        self.title_label.set_text(&view.title);
        self.selection_label.set_text(&view.selection_info);
        self.countdown_label.set_text(&view.countdown_label);
        self.confirm_button.set_label(&view.confirm_label);
        self.confirm_button.set_sensitive(view.confirm_enabled);

        self.pin_button.set_tooltip_text(Some(view.pin_tooltip));
        if view.pinned {
            self.pin_button.add_css_class("active");
        } else {
            self.pin_button.remove_css_class("active");
        }

        self.grid.widget().set_visible(!view.waiting);
        self.waiting_label.set_visible(view.waiting);
    }

    pub fn connect_confirm<F: Fn() + 'static>(&self, callback: F) {
        *self.callbacks.confirm.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn connect_cancel<F: Fn() + 'static>(&self, callback: F) {
        *self.callbacks.cancel.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn connect_pin<F: Fn() + 'static>(&self, callback: F) {
        *self.callbacks.pin.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn connect_close<F: Fn() + 'static>(&self, callback: F) {
        *self.callbacks.close.borrow_mut() = Some(Rc::new(callback));
    }

    /// Fired when a header drag ends.
    pub fn connect_moved<F: Fn(Position) + 'static>(&self, callback: F) {
        *self.callbacks.moved.borrow_mut() = Some(Rc::new(callback));
    }

    /// Fired during and at the end of a resize drag.
    pub fn connect_resized<F: Fn(Size, bool) + 'static>(&self, callback: F) {
        *self.callbacks.resized.borrow_mut() = Some(Rc::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_clamped_to_desk() {
        let desk = Viewport {
            width: 1000.0,
            height: 800.0,
        };
        let clamped = clamp_position(Position { x: -20.0, y: 900.0 }, desk);
        assert_eq!(clamped, Position { x: 0.0, y: 760.0 });

        let inside = Position { x: 100.0, y: 50.0 };
        assert_eq!(clamp_position(inside, desk), inside);
    }

    #[test]
    fn test_size_respects_minimum_and_cap() {
        let size = clamp_size(
            Size {
                width: 2000.0,
                height: 50.0,
            },
            800,
        );
        assert_eq!(
            size,
            Size {
                width: 800.0,
                height: MIN_HEIGHT
            }
        );
    }

    #[test]
    fn test_grid_area_subtracts_chrome() {
        let (w, h) = grid_area(Size {
            width: 600.0,
            height: 400.0,
        });
        assert_eq!((w, h), (552.0, 260.0));

        let (w, h) = grid_area(Size {
            width: 10.0,
            height: 10.0,
        });
        assert_eq!((w, h), (0.0, 0.0));
    }
}
