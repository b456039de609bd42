// Expanded single-image view for a review batch
// Features:
// - Covers the whole window, image fitted to 90% of the viewport
// - Wheel zoom anchored at the cursor, drag to pan once zoomed past 100%
// - Previous/next navigation across the batch
// - Click on the backdrop or double-click on the image closes it

use gdk4::Texture;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{
    glib, Align, Box as GtkBox, Button, EventControllerScroll, EventControllerScrollFlags, Fixed,
    GestureClick, GestureDrag, Label, Orientation, Overlay, PickFlags, Picture, Widget,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::review::{ExpandedView, ViewerEffect, ViewerKey, ZoomPan};

/// Share of the viewport a fitted image may take
const FIT_MARGIN: f64 = 0.9;

type RequestCallback = Rc<dyn Fn(usize)>;

/// Displayed rectangle `(x, y, width, height)` of an image of natural size
/// `image` inside a container of size `container`.
pub fn image_rect(image: (f64, f64), container: (f64, f64), zoom_pan: ZoomPan) -> (f64, f64, f64, f64) {
    let (img_w, img_h) = image;
    let (box_w, box_h) = container;
    if img_w <= 0.0 || img_h <= 0.0 {
        return (box_w / 2.0, box_h / 2.0, 0.0, 0.0);
    }
    let fit = (FIT_MARGIN * box_w / img_w)
        .min(FIT_MARGIN * box_h / img_h)
        .min(1.0);
    let width = img_w * fit * zoom_pan.zoom;
    let height = img_h * fit * zoom_pan.zoom;
    let x = box_w / 2.0 + zoom_pan.pan_x - width / 2.0;
    let y = box_h / 2.0 + zoom_pan.pan_y - height / 2.0;
    (x, y, width, height)
}

// GObject subclass for ExpandedViewer
mod imp {
    use super::*;

    pub struct ExpandedViewerInner {
        pub overlay: RefCell<Option<Overlay>>,
        // Fixed container for positioning the picture
        pub fixed: RefCell<Option<Fixed>>,
        pub picture: RefCell<Option<Picture>>,
        pub counter_label: RefCell<Option<Label>>,
        pub zoom_label: RefCell<Option<Label>>,
        pub help_label: RefCell<Option<Label>>,
        pub prev_btn: RefCell<Option<Button>>,
        pub next_btn: RefCell<Option<Button>>,
        pub state: RefCell<ExpandedView>,
        pub image_width: Cell<u32>,
        pub image_height: Cell<u32>,
        // Drag origin, the gesture reports offsets relative to it
        pub drag_origin_x: Cell<f64>,
        pub drag_origin_y: Cell<f64>,
        pub on_request: RefCell<Option<RequestCallback>>,
    }

    impl Default for ExpandedViewerInner {
        fn default() -> Self {
            Self {
                overlay: RefCell::new(None),
                fixed: RefCell::new(None),
                picture: RefCell::new(None),
                counter_label: RefCell::new(None),
                zoom_label: RefCell::new(None),
                help_label: RefCell::new(None),
                prev_btn: RefCell::new(None),
                next_btn: RefCell::new(None),
                state: RefCell::new(ExpandedView::new(true)),
                image_width: Cell::new(0),
                image_height: Cell::new(0),
                drag_origin_x: Cell::new(0.0),
                drag_origin_y: Cell::new(0.0),
                on_request: RefCell::new(None),
            }
        }
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ExpandedViewerInner {
        const NAME: &'static str = "NfExpandedViewer";
        type Type = super::ExpandedViewer;
        type ParentType = glib::Object;
    }

    impl ObjectImpl for ExpandedViewerInner {}
}

glib::wrapper! {
    pub struct ExpandedViewer(ObjectSubclass<imp::ExpandedViewerInner>);
}

impl ExpandedViewer {
    pub fn new(shortcuts_enabled: bool) -> Self {
        let obj: Self = glib::Object::builder().build();
        obj.imp()
            .state
            .borrow_mut()
            .set_shortcuts_enabled(shortcuts_enabled);
        obj.setup_widgets();
        obj
    }

    fn setup_widgets(&self) {
        let imp = self.imp();

        let overlay = Overlay::new();
        overlay.set_hexpand(true);
        overlay.set_vexpand(true);
        overlay.add_css_class("nf-expanded-view");
        overlay.set_visible(false);

        let fixed = Fixed::new();
        fixed.set_hexpand(true);
        fixed.set_vexpand(true);

        let picture = Picture::new();
        picture.set_can_shrink(true);
        picture.set_content_fit(gtk4::ContentFit::Fill);
        picture.add_css_class("nf-expanded-image");
        fixed.put(&picture, 0.0, 0.0);
        overlay.set_child(Some(&fixed));

        // Top bar
        let controls = GtkBox::new(Orientation::Horizontal, 6);
        controls.set_halign(Align::Center);
        controls.set_valign(Align::Start);
        controls.set_margin_top(12);
        controls.add_css_class("nf-expanded-controls");

        let close_btn = Button::with_label("×");
        close_btn.set_tooltip_text(Some("Close (Esc)"));
        let prev_btn = Button::with_label("◀");
        prev_btn.set_tooltip_text(Some("Previous (Alt+Left)"));
        let counter_label = Label::new(None);
        counter_label.add_css_class("nf-expanded-counter");
        let next_btn = Button::with_label("▶");
        next_btn.set_tooltip_text(Some("Next (Alt+Right)"));
        let zoom_out_btn = Button::with_label("−");
        zoom_out_btn.set_tooltip_text(Some("Zoom out (Page Down)"));
        let zoom_label = Label::new(Some("100%"));
        zoom_label.add_css_class("nf-expanded-zoom");
        let zoom_in_btn = Button::with_label("+");
        zoom_in_btn.set_tooltip_text(Some("Zoom in (Page Up)"));
        let reset_btn = Button::with_label("⌂");
        reset_btn.set_tooltip_text(Some("Reset zoom (Enter)"));
        let help_btn = Button::with_label("?");
        help_btn.set_tooltip_text(Some("Keyboard shortcuts"));

        controls.append(&close_btn);
        controls.append(&gtk4::Separator::new(Orientation::Vertical));
        controls.append(&prev_btn);
        controls.append(&counter_label);
        controls.append(&next_btn);
        controls.append(&gtk4::Separator::new(Orientation::Vertical));
        controls.append(&zoom_out_btn);
        controls.append(&zoom_label);
        controls.append(&zoom_in_btn);
        controls.append(&reset_btn);
        controls.append(&gtk4::Separator::new(Orientation::Vertical));
        controls.append(&help_btn);

        let help_label = Label::new(None);
        help_label.set_halign(Align::Center);
        help_label.set_valign(Align::Center);
        help_label.add_css_class("nf-expanded-help");
        help_label.set_visible(false);

        overlay.add_overlay(&controls);
        overlay.add_overlay(&help_label);

        *imp.overlay.borrow_mut() = Some(overlay.clone());
        *imp.fixed.borrow_mut() = Some(fixed.clone());
        *imp.picture.borrow_mut() = Some(picture);
        *imp.counter_label.borrow_mut() = Some(counter_label);
        *imp.zoom_label.borrow_mut() = Some(zoom_label);
        *imp.help_label.borrow_mut() = Some(help_label);
        *imp.prev_btn.borrow_mut() = Some(prev_btn.clone());
        *imp.next_btn.borrow_mut() = Some(next_btn.clone());

        self.setup_gestures(&overlay, &fixed);

        let viewer_weak = self.downgrade();
        close_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.hide();
            }
        });

        let viewer_weak = self.downgrade();
        prev_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let effect = viewer.imp().state.borrow_mut().navigate(-1);
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        next_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let effect = viewer.imp().state.borrow_mut().navigate(1);
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        zoom_out_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let effect = viewer.imp().state.borrow_mut().zoom_out();
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        zoom_in_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let effect = viewer.imp().state.borrow_mut().zoom_in();
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        reset_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let effect = viewer.imp().state.borrow_mut().reset_zoom();
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        help_btn.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.toggle_help();
            }
        });
    }

    fn setup_gestures(&self, overlay: &Overlay, fixed: &Fixed) {
        // Pan, only while zoomed in
        let drag_gesture = GestureDrag::new();
        drag_gesture.set_button(1);

        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_begin(move |gesture, x, y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let imp = viewer.imp();
                imp.drag_origin_x.set(x);
                imp.drag_origin_y.set(y);
                if !imp.state.borrow_mut().drag_begin(x, y) {
                    gesture.set_state(gtk4::EventSequenceState::Denied);
                }
            }
        });

        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_update(move |_, offset_x, offset_y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let imp = viewer.imp();
                let x = imp.drag_origin_x.get() + offset_x;
                let y = imp.drag_origin_y.get() + offset_y;
                let effect = imp.state.borrow_mut().drag_motion(x, y);
                viewer.apply(effect);
            }
        });

        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_end(move |_, _, _| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().state.borrow_mut().drag_end();
            }
        });
        fixed.add_controller(drag_gesture);

        // Backdrop click and image double-click close the view
        let click = GestureClick::new();
        click.set_button(1);
        let viewer_weak = self.downgrade();
        let overlay_weak = overlay.downgrade();
        click.connect_pressed(move |_, n_press, x, y| {
            let (Some(viewer), Some(overlay)) = (viewer_weak.upgrade(), overlay_weak.upgrade())
            else {
                return;
            };
            let imp = viewer.imp();
            let target = overlay.pick(x, y, PickFlags::DEFAULT);
            let on_backdrop = match (target.as_ref(), imp.fixed.borrow().as_ref()) {
                (Some(target), Some(fixed)) => target == fixed.upcast_ref::<Widget>(),
                _ => false,
            };
            let on_image = match (target.as_ref(), imp.picture.borrow().as_ref()) {
                (Some(target), Some(picture)) => target == picture.upcast_ref::<Widget>(),
                _ => false,
            };
            if (n_press == 1 && on_backdrop) || (n_press == 2 && on_image) {
                viewer.hide();
            }
        });
        fixed.add_controller(click);

        // Wheel zoom around the cursor
        let scroll_controller = EventControllerScroll::new(EventControllerScrollFlags::VERTICAL);
        let viewer_weak = self.downgrade();
        scroll_controller.connect_scroll(move |controller, _dx, dy| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let imp = viewer.imp();
                let Some((width, height)) = viewer.container_size() else {
                    return glib::Propagation::Stop;
                };
                let pointer = controller
                    .current_event()
                    .and_then(|event| event.position())
                    .unwrap_or((width / 2.0, height / 2.0));
                let effect = imp
                    .state
                    .borrow_mut()
                    .wheel(dy, pointer, (width, height));
                viewer.apply(effect);
            }
            glib::Propagation::Stop
        });
        fixed.add_controller(scroll_controller);
    }

    /// Get the widget to add to the UI
    pub fn widget(&self) -> Option<Widget> {
        self.imp()
            .overlay
            .borrow()
            .as_ref()
            .map(|overlay| overlay.clone().upcast())
    }

    /// Called with the index whose texture the view needs.
    pub fn connect_request<F: Fn(usize) + 'static>(&self, callback: F) {
        *self.imp().on_request.borrow_mut() = Some(Rc::new(callback));
    }

    /// Open on image `index` of a batch of `count`.
    pub fn open(&self, index: usize, count: usize) {
        let effect = self.imp().state.borrow_mut().show(index, count);
        self.apply(effect);
    }

    pub fn hide(&self) {
        let effect = self.imp().state.borrow_mut().hide();
        self.apply(effect);
    }

    pub fn set_shortcuts_enabled(&self, enabled: bool) {
        let imp = self.imp();
        imp.state.borrow_mut().set_shortcuts_enabled(enabled);
        if let Some(help) = imp.help_label.borrow().as_ref() {
            help.set_text(imp.state.borrow().help_text());
        }
    }

    /// Keyboard entry point. Returns true when the key was consumed.
    pub fn handle_key(&self, key: ViewerKey, alt: bool) -> bool {
        let effect = self.imp().state.borrow_mut().key(key, alt);
        match effect {
            Some(effect) => {
                self.apply(effect);
                true
            }
            None => false,
        }
    }

    /// Texture for image `index`; ignored unless it is the one on display.
    pub fn set_texture(&self, index: usize, texture: &Texture) {
        let imp = self.imp();
        {
            let state = imp.state.borrow();
            if !state.is_visible() || state.index() != index {
                return;
            }
        }
        imp.image_width.set(texture.width().max(0) as u32);
        imp.image_height.set(texture.height().max(0) as u32);
        if let Some(picture) = imp.picture.borrow().as_ref() {
            picture.set_paintable(Some(texture));
        }
        self.update_transform();
    }

    fn apply(&self, effect: ViewerEffect) {
        let imp = self.imp();
        match effect {
            ViewerEffect::None => return,
            ViewerEffect::Load(index) => {
                imp.image_width.set(0);
                imp.image_height.set(0);
                if let Some(picture) = imp.picture.borrow().as_ref() {
                    picture.set_paintable(Option::<&Texture>::None);
                }
                if let Some(overlay) = imp.overlay.borrow().as_ref() {
                    overlay.set_visible(true);
                    overlay.grab_focus();
                }
                let callback = imp.on_request.borrow().clone();
                if let Some(callback) = callback {
                    callback(index);
                }
            }
            ViewerEffect::Transform => self.update_transform(),
            ViewerEffect::Hide => {
                if let Some(overlay) = imp.overlay.borrow().as_ref() {
                    overlay.set_visible(false);
                }
                if let Some(help) = imp.help_label.borrow().as_ref() {
                    help.set_visible(false);
                }
                // Clear the picture to free memory
                if let Some(picture) = imp.picture.borrow().as_ref() {
                    picture.set_paintable(Option::<&Texture>::None);
                }
            }
        }
        self.update_controls();
    }

    fn update_controls(&self) {
        let imp = self.imp();
        let state = imp.state.borrow();
        if let Some(label) = imp.counter_label.borrow().as_ref() {
            label.set_text(&state.counter_text());
        }
        if let Some(label) = imp.zoom_label.borrow().as_ref() {
            label.set_text(&state.zoom_text());
        }
        if let Some(button) = imp.prev_btn.borrow().as_ref() {
            button.set_sensitive(state.can_go_previous());
        }
        if let Some(button) = imp.next_btn.borrow().as_ref() {
            button.set_sensitive(state.can_go_next());
        }
    }

    fn toggle_help(&self) {
        let imp = self.imp();
        if let Some(help) = imp.help_label.borrow().as_ref() {
            help.set_text(imp.state.borrow().help_text());
            help.set_visible(!help.is_visible());
        }
    }

    fn container_size(&self) -> Option<(f64, f64)> {
        let fixed = self.imp().fixed.borrow();
        let fixed = fixed.as_ref()?;
        let width = fixed.width() as f64;
        let height = fixed.height() as f64;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some((width, height))
    }

    /// Update the picture placement from the current zoom and pan
    fn update_transform(&self) {
        let imp = self.imp();
        let Some(container) = self.container_size() else {
            return;
        };
        let image = (
            imp.image_width.get() as f64,
            imp.image_height.get() as f64,
        );
        let zoom_pan = imp.state.borrow().zoom_pan();
        let (x, y, width, height) = image_rect(image, container, zoom_pan);

        let fixed = imp.fixed.borrow();
        let picture = imp.picture.borrow();
        if let (Some(fixed), Some(picture)) = (fixed.as_ref(), picture.as_ref()) {
            picture.set_size_request(width.round() as i32, height.round() as i32);
            fixed.move_(picture, x, y);
        }
        if let Some(label) = imp.zoom_label.borrow().as_ref() {
            label.set_text(&imp.state.borrow().zoom_text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_image_is_not_upscaled() {
        let rect = image_rect((100.0, 50.0), (1000.0, 800.0), ZoomPan::IDENTITY);
        assert_eq!(rect, (450.0, 375.0, 100.0, 50.0));
    }

    #[test]
    fn test_large_image_fits_ninety_percent() {
        let (_, _, width, height) =
            image_rect((2000.0, 1000.0), (1000.0, 1000.0), ZoomPan::IDENTITY);
        assert!((width - 900.0).abs() < 1e-9);
        assert!((height - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_and_pan_move_rect() {
        let zoom_pan = ZoomPan {
            zoom: 2.0,
            pan_x: 10.0,
            pan_y: -20.0,
        };
        let rect = image_rect((100.0, 100.0), (1000.0, 1000.0), zoom_pan);
        assert_eq!(rect, (410.0, 380.0, 200.0, 200.0));
    }

    #[test]
    fn test_unknown_size_collapses_to_center() {
        let rect = image_rect((0.0, 0.0), (400.0, 300.0), ZoomPan::IDENTITY);
        assert_eq!(rect, (200.0, 150.0, 0.0, 0.0));
    }
}
