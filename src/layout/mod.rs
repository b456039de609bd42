pub mod grid;

pub use grid::{GridLayout, ImageDims, ImageSizes, LayoutResult};
