pub mod controller;
pub mod countdown;
pub mod expanded;
pub mod selection;

pub use controller::{Effect, ReviewController, ReviewEvent, ReviewView};
pub use expanded::{ExpandedView, ViewerEffect, ViewerKey, ZoomPan};
pub use selection::SelectionState;
