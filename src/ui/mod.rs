pub mod dialog;
pub mod grid;
pub mod keybindings;
pub mod viewer;
pub mod window;

pub use window::MainWindow;
