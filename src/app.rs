use gtk4::prelude::*;
use gtk4::Application;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::config::Settings;
use crate::host::HostClient;
use crate::ui::MainWindow;

const APP_ID: &str = "io.github.nfpreview.Selector";

pub struct NfPreviewApp {
    app: Application,
}

impl NfPreviewApp {
    pub fn new(settings: Settings, settings_path: Option<PathBuf>, host: HostClient) -> Self {
        let app = Application::builder()
            .application_id(APP_ID)
            .flags(gio::ApplicationFlags::NON_UNIQUE)
            .build();

        let host = Rc::new(host);
        // Keeps the window alive for the lifetime of the application.
        let main_window: Rc<RefCell<Option<Rc<MainWindow>>>> = Rc::new(RefCell::new(None));
        app.connect_activate(move |app| {
            if let Some(window) = main_window.borrow().as_ref() {
                window.present();
                return;
            }
            let window = MainWindow::new(
                app,
                settings.clone(),
                settings_path.clone(),
                host.clone(),
            );
            window.present();
            *main_window.borrow_mut() = Some(window);
        });

        Self { app }
    }

    /// Run the GTK main loop. Arguments were already parsed by clap.
    pub fn run(&self) -> i32 {
        self.app.run_with_args(&["nf-preview"]).into()
    }
}
