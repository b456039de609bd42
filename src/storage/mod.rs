pub mod geometry;
pub mod kv;

pub use geometry::{Geometry, GeometryStore, Position, Size, Viewport};
pub use kv::{KvStore, MemoryKv, SqliteKv};

use tracing::warn;

/// Persistent store if it can be opened, otherwise an in-memory one.
pub fn open_state_store() -> Box<dyn KvStore> {
    match SqliteKv::open_default() {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(error = ?err, "State store unavailable, geometry will not persist");
            Box::new(MemoryKv::default())
        }
    }
}
