// Main window for nf-preview
// GTK4 ApplicationWindow with a desk for the floating review panel, the
// expanded viewer on top, and terminal aesthetic CSS

use gdk4::{Display, MemoryFormat, MemoryTexture, Texture};
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, CheckButton, CssProvider, Fixed,
    Label, Orientation, Overlay, SpinButton, Window, STYLE_PROVIDER_PRIORITY_APPLICATION,
};
use lru::LruCache;
use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::Duration;
use xxhash_rust::xxh3::xxh3_64;

use super::dialog::ReviewPanel;
use super::grid::{CELL_FRAME, CELL_SPACING};
use super::keybindings::Keybindings;
use super::viewer::ExpandedViewer;
use crate::config::{Settings, MAX_MAX_WIDTH, MIN_MAX_WIDTH};
use crate::host::{HostClient, HostEvent};
use crate::image_loader::{DecodePool, DecodeResult, DecodedImage};
use crate::layout::{GridLayout, ImageSizes};
use crate::models::OpaqueId;
use crate::review::{Effect, ReviewController, ReviewEvent};
use crate::storage::{open_state_store, GeometryStore, KvStore, Viewport};

const DIALOG_MARGIN: i32 = 12;
/// Decoded textures, keyed by review id and image URL
const TEXTURE_CACHE_ENTRIES: usize = 64;
const RELAYOUT_DELAY: Duration = Duration::from_millis(30);

/// CSS for terminal aesthetic - embedded as fallback
const FALLBACK_CSS: &str = r#"
* {
    border-radius: 0;
    box-shadow: none;
    background-image: none;
}

window {
    background-color: #0a0a0a;
    color: #e0e0e0;
}

button {
    background-color: transparent;
    border: 1px solid #333333;
    color: #e0e0e0;
}

button:hover {
    background-color: rgba(224, 224, 224, 0.05);
    border-color: #555555;
}

button:disabled {
    color: #555555;
}

.status-bar {
    color: #888888;
}

.muted {
    opacity: 0.7;
}

.nf-preview-dialog {
    background-color: #121212;
    border: 1px solid #333333;
    padding: 12px;
}

.nf-preview-header {
    border-bottom: 1px solid #333333;
    padding-bottom: 6px;
}

.nf-preview-title {
    color: #00ff88;
    font-weight: bold;
}

.nf-pin-button.active {
    border-color: #00ff88;
    background-color: rgba(0, 255, 136, 0.12);
}

.nf-image-container {
    background-color: #0a0a0a;
    border: 1px solid #333333;
}

.nf-image-container:hover {
    border-color: #555555;
}

.nf-image-container.selected {
    border-color: #00ff88;
    border-style: dashed;
    border-width: 2px;
    background-color: rgba(0, 255, 136, 0.08);
}

.nf-image-overlay {
    background-color: rgba(0, 0, 0, 0.7);
    color: #00ff88;
    padding: 2px 6px;
    font-size: 11px;
    font-weight: bold;
}

.nf-waiting {
    color: #888888;
    font-style: italic;
}

.nf-countdown {
    color: #ffaa00;
}

.nf-resize-grip {
    border-right: 2px solid #555555;
    border-bottom: 2px solid #555555;
}

.nf-expanded-view {
    background-color: rgba(0, 0, 0, 0.92);
}

.nf-expanded-controls {
    background-color: rgba(10, 10, 10, 0.85);
    border: 1px solid #333333;
    padding: 4px 8px;
}

.nf-expanded-help {
    background-color: #121212;
    border: 1px solid #00ff88;
    padding: 16px;
    font-family: monospace;
}
"#;

/// Cache key for a decoded image. Temp filenames are reused across runs, so
/// the URL alone does not identify the pixels.
fn texture_key(review_id: &OpaqueId, url: &str) -> u64 {
    xxh3_64(format!("{review_id}\n{url}").as_bytes())
}

/// Load and apply the stylesheet, preferring `<config dir>/style.css`
fn load_css() {
    let provider = CssProvider::new();

    let user_css = Settings::default_path()
        .and_then(|path| path.parent().map(|dir| dir.join("style.css")))
        .filter(|path| path.exists());

    if let Some(css_path) = user_css {
        provider.load_from_path(&css_path);
        tracing::info!("Loaded CSS from: {:?}", css_path);
    } else {
        provider.load_from_string(FALLBACK_CSS);
        tracing::info!("Loaded fallback embedded CSS");
    }

    if let Some(display) = Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

/// Create a GDK texture from RGBA data
fn create_texture_from_rgba(image: DecodedImage) -> Option<Texture> {
    if image.width == 0 || image.height == 0 {
        return None;
    }
    let expected = image.stride() * image.height as usize;
    if image.data.len() < expected {
        tracing::warn!(
            "Skipping texture: data too small ({} bytes for {}x{})",
            image.data.len(),
            image.width,
            image.height
        );
        return None;
    }
    let stride = image.stride();
    let bytes = glib::Bytes::from_owned(image.data);
    let texture = MemoryTexture::new(
        image.width as i32,
        image.height as i32,
        MemoryFormat::R8g8b8a8,
        &bytes,
        stride,
    );
    Some(texture.upcast())
}

struct DialogShell {
    dialog: Window,
    content: GtkBox,
    close_button: Button,
}

/// Main window hosting the review panel
pub struct MainWindow {
    self_weak: RefCell<Weak<MainWindow>>,
    window: ApplicationWindow,
    desk: Fixed,
    status_label: Label,
    panel: Rc<ReviewPanel>,
    viewer: ExpandedViewer,
    keybindings: Rc<Keybindings>,
    controller: RefCell<ReviewController>,
    host: Rc<HostClient>,
    decoder: DecodePool,
    settings: RefCell<Settings>,
    settings_path: Option<PathBuf>,
    geometry: GeometryStore<Box<dyn KvStore>>,
    layout: GridLayout,
    sizes: RefCell<ImageSizes>,
    textures: RefCell<Vec<Option<Texture>>>,
    texture_cache: RefCell<LruCache<u64, Texture>>,
    timer: RefCell<Option<glib::SourceId>>,
    relayout_pending: Cell<bool>,
    shutting_down: Cell<bool>,
}

impl MainWindow {
    pub fn new(
        app: &Application,
        settings: Settings,
        settings_path: Option<PathBuf>,
        host: Rc<HostClient>,
    ) -> Rc<Self> {
        // Load CSS before creating widgets
        load_css();

        let window = ApplicationWindow::builder()
            .application(app)
            .title("NF Preview Selector")
            .default_width(1280)
            .default_height(860)
            .build();

        // Status bar
        let status_bar = GtkBox::new(Orientation::Horizontal, 8);
        status_bar.add_css_class("status-bar");
        status_bar.set_margin_start(8);
        status_bar.set_margin_end(8);
        status_bar.set_margin_top(4);
        status_bar.set_margin_bottom(4);

        let status_label = Label::new(Some("> Connecting…"));
        status_label.set_halign(Align::Start);
        status_label.set_hexpand(true);
        status_label.add_css_class("muted");
        status_bar.append(&status_label);

        let settings_button = Button::with_label("[settings]");
        settings_button.set_tooltip_text(Some("Settings"));
        status_bar.append(&settings_button);

        // Desk the floating panel is placed on
        let desk = Fixed::new();
        desk.set_hexpand(true);
        desk.set_vexpand(true);

        let body = GtkBox::new(Orientation::Vertical, 0);
        body.append(&status_bar);
        body.append(&desk);

        let viewer = ExpandedViewer::new(settings.keyboard_shortcuts);
        let root = Overlay::new();
        root.set_child(Some(&body));
        if let Some(viewer_widget) = viewer.widget() {
            root.add_overlay(&viewer_widget);
        }
        window.set_child(Some(&root));

        let panel = ReviewPanel::new(&desk, settings.max_width());
        let keybindings = Rc::new(Keybindings::new());

        let (result_tx, result_rx) = async_channel::unbounded::<DecodeResult>();
        let decoder = DecodePool::new(result_tx);

        let cache_size =
            NonZeroUsize::new(TEXTURE_CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN);

        let main_window = Rc::new(Self {
            self_weak: RefCell::new(Weak::new()),
            window,
            desk,
            status_label,
            panel,
            viewer,
            keybindings,
            controller: RefCell::new(ReviewController::new()),
            host,
            decoder,
            settings: RefCell::new(settings),
            settings_path,
            geometry: GeometryStore::new(open_state_store()),
            layout: GridLayout {
                spacing: CELL_SPACING as f32,
                cell_frame: CELL_FRAME as f32,
                ..GridLayout::default()
            },
            sizes: RefCell::new(ImageSizes::default()),
            textures: RefCell::new(Vec::new()),
            texture_cache: RefCell::new(LruCache::new(cache_size)),
            timer: RefCell::new(None),
            relayout_pending: Cell::new(false),
            shutting_down: Cell::new(false),
        });
        *main_window.self_weak.borrow_mut() = Rc::downgrade(&main_window);

        main_window.setup_panel();
        main_window.setup_viewer();
        main_window.setup_keybindings();
        main_window.listen_for_decodes(result_rx);
        main_window.listen_for_host();

        let window_weak = Rc::downgrade(&main_window);
        settings_button.connect_clicked(move |_| {
            if let Some(window) = window_weak.upgrade() {
                window.open_settings();
            }
        });

        // An open review is cancelled, not abandoned, when the app quits.
        let window_weak = Rc::downgrade(&main_window);
        main_window.window.connect_close_request(move |_| {
            if let Some(window) = window_weak.upgrade() {
                window.shutting_down.set(true);
                if window.controller.borrow().is_visible() {
                    window.dispatch(ReviewEvent::CloseRequested);
                }
            }
            glib::Propagation::Proceed
        });

        main_window
    }

    fn setup_panel(&self) {
        let panel = &self.panel;

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_confirm(move || {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::Confirm);
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_cancel(move || {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::Cancel);
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_pin(move || {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::TogglePin);
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_close(move || {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::CloseRequested);
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_moved(move |position| {
            if let Some(window) = window_weak.upgrade() {
                if window.settings.borrow().remember_window_position {
                    window.geometry.save_position(position);
                }
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.connect_resized(move |size, finished| {
            if let Some(window) = window_weak.upgrade() {
                window.schedule_relayout();
                if finished && window.settings.borrow().remember_window_position {
                    window.geometry.save_size(size);
                }
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.grid().connect_toggle(move |index| {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::Toggle(index));
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        panel.grid().connect_expand(move |index| {
            if let Some(window) = window_weak.upgrade() {
                let count = window.panel.grid().len();
                window.viewer.open(index, count);
            }
        });
    }

    fn setup_viewer(&self) {
        let window_weak = self.self_weak.borrow().clone();
        self.viewer.connect_request(move |index| {
            if let Some(window) = window_weak.upgrade() {
                let texture = window.textures.borrow().get(index).cloned().flatten();
                if let Some(texture) = texture {
                    window.viewer.set_texture(index, &texture);
                }
            }
        });
    }

    /// Set up keybindings for the window
    fn setup_keybindings(&self) {
        self.keybindings.attach(&self.window);

        let window_weak = self.self_weak.borrow().clone();
        self.keybindings.connect_queue_interrupt(move || {
            if let Some(window) = window_weak.upgrade() {
                window.dispatch(ReviewEvent::QueueInterrupt);
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        self.keybindings.connect_viewer_key(move |key, alt| {
            window_weak
                .upgrade()
                .map(|window| window.viewer.handle_key(key, alt))
                .unwrap_or(false)
        });
    }

    fn listen_for_host(&self) {
        let events = self.host.subscribe();
        self.set_status(&format!("> Connecting to {}", self.host.endpoint().ws_url));

        let window_weak = self.self_weak.borrow().clone();
        glib::spawn_future_local(async move {
            while let Ok(event) = events.recv().await {
                let Some(window) = window_weak.upgrade() else {
                    break;
                };
                window.handle_host_event(event);
            }
        });
    }

    fn handle_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::ReviewRequest(batch) => {
                self.set_status(&format!(
                    "> Review {} with {} images",
                    batch.review_id,
                    batch.len()
                ));
                self.dispatch(ReviewEvent::Show(batch));
            }
            HostEvent::QueueStarted => self.dispatch(ReviewEvent::QueueInterrupt),
            HostEvent::QueueIdle => {}
            HostEvent::Connected => self.set_status("> Connected"),
            HostEvent::Disconnected => self.set_status("> Disconnected, retrying"),
        }
    }

    fn listen_for_decodes(&self, results: async_channel::Receiver<DecodeResult>) {
        let window_weak = self.self_weak.borrow().clone();
        glib::spawn_future_local(async move {
            while let Ok(result) = results.recv().await {
                let Some(window) = window_weak.upgrade() else {
                    break;
                };
                window.handle_decoded(result);
            }
        });
    }

    fn handle_decoded(&self, result: DecodeResult) {
        if !self.decoder.is_current(result.generation) {
            return;
        }
        let index = result.index;
        let Some(review_id) = self
            .controller
            .borrow()
            .batch()
            .map(|batch| batch.review_id.clone())
        else {
            return;
        };
        let Some(texture) = create_texture_from_rgba(result.image) else {
            return;
        };
        self.texture_cache
            .borrow_mut()
            .put(texture_key(&review_id, &result.url), texture.clone());
        self.show_texture(index, texture);
    }

    fn show_texture(&self, index: usize, texture: Texture) {
        if let Some(slot) = self.textures.borrow_mut().get_mut(index) {
            *slot = Some(texture.clone());
        }
        self.panel.grid().set_texture(index, &texture);
        let changed = self.sizes.borrow_mut().record(
            index,
            texture.width().max(0) as u32,
            texture.height().max(0) as u32,
        );
        if changed {
            self.schedule_relayout();
        }
        self.viewer.set_texture(index, &texture);
    }

    /// Feed one event to the controller and carry out what it asks for.
    fn dispatch(&self, event: ReviewEvent) {
        let effects = self.controller.borrow_mut().handle(event);
        for effect in effects {
            self.apply_effect(effect);
        }
        self.refresh_view();
    }

    fn apply_effect(&self, effect: Effect) {
        match effect {
            Effect::StopTimer => self.stop_timer(),
            Effect::StartTimer => self.start_timer(),
            Effect::Submit(response) => {
                if self.shutting_down.get() {
                    self.host.submit_blocking(response);
                } else {
                    self.host.submit(response);
                }
            }
            Effect::OpenDialog => self.open_panel(),
            Effect::RenderBatch => self.render_batch(),
            Effect::ShowWaiting => self.clear_batch(),
            Effect::CloseDialog => {
                self.clear_batch();
                self.panel.close();
            }
        }
    }

    fn stop_timer(&self) {
        if let Some(source) = self.timer.borrow_mut().take() {
            source.remove();
        }
    }

    fn start_timer(&self) {
        self.stop_timer();
        let window_weak = self.self_weak.borrow().clone();
        let source = glib::timeout_add_seconds_local(1, move || {
            let Some(window) = window_weak.upgrade() else {
                return glib::ControlFlow::Break;
            };
            window.dispatch(ReviewEvent::Tick);
            glib::ControlFlow::Continue
        });
        *self.timer.borrow_mut() = Some(source);
    }

    fn desk_viewport(&self) -> Viewport {
        let (width, height) = if self.desk.width() > 0 && self.desk.height() > 0 {
            (self.desk.width(), self.desk.height())
        } else {
            (self.window.width(), self.window.height())
        };
        Viewport {
            width: width as f64,
            height: height as f64,
        }
    }

    fn open_panel(&self) {
        self.viewer.hide();
        let (remember, max_width) = {
            let settings = self.settings.borrow();
            (settings.remember_window_position, settings.max_width())
        };
        let geometry = self
            .geometry
            .initial_geometry(self.desk_viewport(), remember, max_width);
        tracing::debug!("opening review panel at {:?}", geometry);
        self.panel.open(geometry);
    }

    /// Build the grid for the live batch and start loading its images.
    fn render_batch(&self) {
        self.viewer.hide();
        let Some(batch) = self.controller.borrow().batch().cloned() else {
            return;
        };
        let generation = self.decoder.next_generation();
        let count = batch.len();

        self.sizes.borrow_mut().reset(count);
        *self.textures.borrow_mut() = vec![None; count];
        self.panel.grid().rebuild(count);
        self.relayout();

        let base = self.host.endpoint().http_base.clone();
        for (index, image) in batch.images.iter().enumerate() {
            let key = texture_key(&batch.review_id, &image.view_url(&base));
            let cached = self.texture_cache.borrow_mut().get(&key).cloned();
            match cached {
                Some(texture) => self.show_texture(index, texture),
                None => self
                    .host
                    .fetch_image(&self.decoder, generation, index, image),
            }
        }
    }

    /// Drop the grid contents and invalidate in-flight loads.
    fn clear_batch(&self) {
        self.viewer.hide();
        self.decoder.next_generation();
        self.panel.grid().clear();
        self.textures.borrow_mut().clear();
        self.sizes.borrow_mut().reset(0);
    }

    fn schedule_relayout(&self) {
        if self.relayout_pending.replace(true) {
            return;
        }
        let weak_self = self.self_weak.borrow().clone();
        glib::timeout_add_local(RELAYOUT_DELAY, move || {
            if let Some(window) = weak_self.upgrade() {
                window.relayout_pending.set(false);
                window.relayout();
            }
            glib::ControlFlow::Break
        });
    }

    fn relayout(&self) {
        let (width, height) = self.panel.grid_area();
        let result = self
            .layout
            .compute(self.sizes.borrow().as_slice(), width, height);
        self.panel.grid().apply_layout(result);
    }

    fn refresh_view(&self) {
        let controller = self.controller.borrow();
        let view = controller.view();
        self.panel.apply_view(&view);
        self.panel.grid().sync_selection(controller.selection());
    }

    fn build_dialog_shell(&self, title: &str, width: i32) -> DialogShell {
        let dialog = Window::builder()
            .title(title)
            .transient_for(&self.window)
            .modal(true)
            .resizable(false)
            .default_width(width)
            .build();

        let content = GtkBox::new(Orientation::Vertical, 12);
        content.set_margin_top(DIALOG_MARGIN);
        content.set_margin_bottom(DIALOG_MARGIN);
        content.set_margin_start(DIALOG_MARGIN);
        content.set_margin_end(DIALOG_MARGIN);

        let header = GtkBox::new(Orientation::Horizontal, 8);
        let close_button = Button::with_label("Close");
        header.append(&close_button);
        let header_spacer = GtkBox::new(Orientation::Horizontal, 0);
        header_spacer.set_hexpand(true);
        header.append(&header_spacer);
        content.append(&header);

        dialog.set_child(Some(&content));

        DialogShell {
            dialog,
            content,
            close_button,
        }
    }

    fn open_settings(&self) {
        let dialog_shell = self.build_dialog_shell("Settings", 420);
        let dialog = dialog_shell.dialog;
        let content = dialog_shell.content;
        let close_button = dialog_shell.close_button;

        let settings = self.settings.borrow().clone();

        let server_label = Label::new(Some(&format!("Server: {}", settings.server_url)));
        server_label.set_halign(Align::Start);
        server_label.add_css_class("muted");
        content.append(&server_label);

        let remember_toggle = CheckButton::with_label("Remember window position and size");
        remember_toggle.set_active(settings.remember_window_position);
        content.append(&remember_toggle);

        let shortcuts_toggle =
            CheckButton::with_label("Enable keyboard shortcuts in expanded view");
        shortcuts_toggle.set_active(settings.keyboard_shortcuts);
        content.append(&shortcuts_toggle);

        let width_row = GtkBox::new(Orientation::Horizontal, 8);
        let width_label = Label::new(Some("Max panel width (px)"));
        width_label.set_hexpand(true);
        width_label.set_halign(Align::Start);
        let width_spin =
            SpinButton::with_range(MIN_MAX_WIDTH as f64, MAX_MAX_WIDTH as f64, 50.0);
        width_spin.set_value(settings.max_width() as f64);
        width_row.append(&width_label);
        width_row.append(&width_spin);
        content.append(&width_row);

        let window_weak = self.self_weak.borrow().clone();
        remember_toggle.connect_toggled(move |toggle| {
            if let Some(window) = window_weak.upgrade() {
                window.settings.borrow_mut().remember_window_position = toggle.is_active();
                window.save_settings();
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        shortcuts_toggle.connect_toggled(move |toggle| {
            if let Some(window) = window_weak.upgrade() {
                let enabled = toggle.is_active();
                window.settings.borrow_mut().keyboard_shortcuts = enabled;
                window.viewer.set_shortcuts_enabled(enabled);
                window.save_settings();
            }
        });

        let window_weak = self.self_weak.borrow().clone();
        width_spin.connect_value_changed(move |spin| {
            if let Some(window) = window_weak.upgrade() {
                let width = spin.value().round().max(0.0) as u32;
                window.settings.borrow_mut().set_max_width(width);
                let max_width = window.settings.borrow().max_width();
                window.panel.set_max_width(max_width);
                window.schedule_relayout();
                window.save_settings();
            }
        });

        let dialog_weak = dialog.downgrade();
        close_button.connect_clicked(move |_| {
            if let Some(dialog) = dialog_weak.upgrade() {
                dialog.close();
            }
        });

        dialog.present();
    }

    fn save_settings(&self) {
        let Some(path) = self.settings_path.as_deref() else {
            return;
        };
        if let Err(err) = self.settings.borrow().save_to(path) {
            tracing::warn!(error = ?err, "Failed to save settings");
        }
    }

    pub fn set_status(&self, status: &str) {
        self.status_label.set_text(status);
    }

    /// Present the window
    pub fn present(&self) {
        self.window.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_key_separates_reviews_sharing_a_url() {
        let url = "http://127.0.0.1:8188/view?filename=NFPreview_00001_.png&type=temp&subfolder=";
        let first = texture_key(&OpaqueId::new("review-1"), url);
        assert_eq!(first, texture_key(&OpaqueId::new("review-1"), url));
        assert_ne!(first, texture_key(&OpaqueId::new("review-2"), url));
        assert_ne!(
            first,
            texture_key(&OpaqueId::new("review-1"), &url.replace("00001", "00002"))
        );
    }
}
