//! Remembered position and size of the floating review panel.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::kv::KvStore;

pub const POSITION_KEY: &str = "nf-preview-dialog-position";
pub const SIZE_KEY: &str = "nf-preview-dialog-size";

/// Size used when nothing valid is remembered
pub const DEFAULT_WIDTH: f64 = 600.0;
pub const DEFAULT_HEIGHT: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Size of the area the panel lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub position: Position,
    pub size: Size,
}

impl Position {
    fn fits(&self, viewport: Viewport) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < viewport.width && self.y < viewport.height
    }
}

impl Size {
    fn fits(&self, viewport: Viewport) -> bool {
        self.width > 200.0
            && self.height > 150.0
            && self.width < viewport.width + 100.0
            && self.height < viewport.height + 100.0
    }
}

pub struct GeometryStore<K> {
    kv: K,
}

impl<K: KvStore> GeometryStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = ?err, "Failed to read {}", key);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("discarding unreadable {}: {}", key, err);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(crate::error::Error::from)
            .and_then(|json| self.kv.set(key, &json));
        if let Err(err) = result {
            warn!(error = ?err, "Failed to save {}", key);
        }
    }

    /// Remembered origin, if it lies inside `viewport`.
    pub fn load_position(&self, viewport: Viewport) -> Option<Position> {
        self.read::<Position>(POSITION_KEY)
            .filter(|position| position.fits(viewport))
    }

    /// Remembered size, if plausible for `viewport`.
    pub fn load_size(&self, viewport: Viewport) -> Option<Size> {
        self.read::<Size>(SIZE_KEY).filter(|size| size.fits(viewport))
    }

    pub fn save_position(&self, position: Position) {
        self.write(POSITION_KEY, &position);
    }

    pub fn save_size(&self, size: Size) {
        self.write(SIZE_KEY, &size);
    }

    /// Where a freshly created panel goes.
    ///
    /// Without a valid remembered origin the panel is centered using its final
    /// size. The width never exceeds `max_width`.
    pub fn initial_geometry(&self, viewport: Viewport, remember: bool, max_width: u32) -> Geometry {
        let saved_size = if remember { self.load_size(viewport) } else { None };
        let saved_position = if remember {
            self.load_position(viewport)
        } else {
            None
        };

        let mut size = saved_size.unwrap_or(Size {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        });
        size.width = size.width.min(max_width as f64);

        let position = saved_position.unwrap_or(Position {
            x: ((viewport.width - size.width) / 2.0).max(0.0),
            y: ((viewport.height - size.height) / 2.0).max(0.0),
        });

        Geometry { position, size }
    }
}
