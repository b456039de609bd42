pub mod batch;
pub mod image_ref;

pub use batch::*;
pub use image_ref::*;
