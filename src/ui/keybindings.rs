// Keybindings for the review window
//
// - Ctrl+Enter: a new job is about to be queued; an open review gives way
// - Escape / PageUp / PageDown / Enter / Home / End / Alt+Left / Alt+Right:
//   expanded view controls, forwarded only while it is open

use gdk4::{Key, ModifierType};
use gtk4::prelude::*;
use gtk4::{EventControllerKey, PropagationPhase, Widget};
use std::cell::RefCell;
use std::rc::Rc;

use crate::review::ViewerKey;

type QueueInterruptCallback = Box<dyn Fn()>;
/// Returns true when the key was consumed.
type ViewerKeyCallback = Box<dyn Fn(ViewerKey, bool) -> bool>;

/// Map a key to the expanded-view key it stands for.
pub fn viewer_key(key: Key) -> Option<ViewerKey> {
    match key {
        Key::Escape => Some(ViewerKey::Escape),
        Key::Return | Key::KP_Enter => Some(ViewerKey::Enter),
        Key::Page_Up | Key::KP_Page_Up => Some(ViewerKey::PageUp),
        Key::Page_Down | Key::KP_Page_Down => Some(ViewerKey::PageDown),
        Key::Home | Key::KP_Home => Some(ViewerKey::Home),
        Key::End | Key::KP_End => Some(ViewerKey::End),
        Key::Left | Key::KP_Left => Some(ViewerKey::Left),
        Key::Right | Key::KP_Right => Some(ViewerKey::Right),
        _ => None,
    }
}

/// Ctrl+Enter, the host's "queue prompt" chord.
pub fn is_queue_shortcut(key: Key, state: ModifierType) -> bool {
    matches!(key, Key::Return | Key::KP_Enter) && state.contains(ModifierType::CONTROL_MASK)
}

/// Window-level key handling, run in the capture phase.
pub struct Keybindings {
    controller: EventControllerKey,
    on_queue_interrupt: Rc<RefCell<Option<QueueInterruptCallback>>>,
    on_viewer_key: Rc<RefCell<Option<ViewerKeyCallback>>>,
}

impl Keybindings {
    pub fn new() -> Self {
        let controller = EventControllerKey::new();
        controller.set_propagation_phase(PropagationPhase::Capture);

        let on_queue_interrupt: Rc<RefCell<Option<QueueInterruptCallback>>> =
            Rc::new(RefCell::new(None));
        let on_viewer_key: Rc<RefCell<Option<ViewerKeyCallback>>> = Rc::new(RefCell::new(None));

        let on_queue_interrupt_clone = on_queue_interrupt.clone();
        let on_viewer_key_clone = on_viewer_key.clone();

        controller.connect_key_pressed(move |_controller, keyval, _keycode, state| {
            let handled =
                Self::handle_key_press(keyval, state, &on_queue_interrupt_clone, &on_viewer_key_clone);
            if handled {
                glib::Propagation::Stop
            } else {
                glib::Propagation::Proceed
            }
        });

        Self {
            controller,
            on_queue_interrupt,
            on_viewer_key,
        }
    }

    /// Attach keybindings to a widget (typically the main window)
    pub fn attach(&self, widget: &impl IsA<Widget>) {
        widget.add_controller(self.controller.clone());
    }

    pub fn connect_queue_interrupt<F>(&self, callback: F)
    where
        F: Fn() + 'static,
    {
        *self.on_queue_interrupt.borrow_mut() = Some(Box::new(callback));
    }

    pub fn connect_viewer_key<F>(&self, callback: F)
    where
        F: Fn(ViewerKey, bool) -> bool + 'static,
    {
        *self.on_viewer_key.borrow_mut() = Some(Box::new(callback));
    }

    fn handle_key_press(
        keyval: Key,
        state: ModifierType,
        on_queue_interrupt: &Rc<RefCell<Option<QueueInterruptCallback>>>,
        on_viewer_key: &Rc<RefCell<Option<ViewerKeyCallback>>>,
    ) -> bool {
        if is_queue_shortcut(keyval, state) {
            if let Some(ref callback) = *on_queue_interrupt.borrow() {
                callback();
            }
            // Let the chord reach other handlers too.
            return false;
        }

        let Some(key) = viewer_key(keyval) else {
            return false;
        };
        let alt = state.contains(ModifierType::ALT_MASK);
        match *on_viewer_key.borrow() {
            Some(ref callback) => callback(key, alt),
            None => false,
        }
    }
}

impl Default for Keybindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_key_mapping() {
        assert_eq!(viewer_key(Key::Escape), Some(ViewerKey::Escape));
        assert_eq!(viewer_key(Key::KP_Enter), Some(ViewerKey::Enter));
        assert_eq!(viewer_key(Key::Page_Down), Some(ViewerKey::PageDown));
        assert_eq!(viewer_key(Key::Right), Some(ViewerKey::Right));
        assert_eq!(viewer_key(Key::a), None);
    }

    #[test]
    fn test_queue_shortcut_needs_control() {
        assert!(is_queue_shortcut(Key::Return, ModifierType::CONTROL_MASK));
        assert!(is_queue_shortcut(
            Key::KP_Enter,
            ModifierType::CONTROL_MASK | ModifierType::SHIFT_MASK
        ));
        assert!(!is_queue_shortcut(Key::Return, ModifierType::empty()));
        assert!(!is_queue_shortcut(Key::space, ModifierType::CONTROL_MASK));
    }

    #[test]
    fn test_queue_shortcut_reaches_callback_without_viewer() {
        let fired = Rc::new(std::cell::Cell::new(0));
        let callback: QueueInterruptCallback = {
            let fired = fired.clone();
            Box::new(move || fired.set(fired.get() + 1))
        };
        let interrupt = Rc::new(RefCell::new(Some(callback)));
        let viewer: Rc<RefCell<Option<ViewerKeyCallback>>> = Rc::new(RefCell::new(None));

        Keybindings::handle_key_press(Key::Return, ModifierType::CONTROL_MASK, &interrupt, &viewer);
        assert_eq!(fired.get(), 1);
        assert!(!Keybindings::handle_key_press(
            Key::Escape,
            ModifierType::empty(),
            &interrupt,
            &viewer
        ));
    }
}
