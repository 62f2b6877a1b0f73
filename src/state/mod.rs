//! Shared counter state.
//!
//! A [`PersistedCell`] holds one value that every view reads and writes.
//! It hydrates from [`Storage`](crate::storage::Storage) once and persists
//! each change back without blocking the writer. [`ReducerHandle`] layers
//! action dispatch over a cell.

mod cell;
mod reducer;

pub use cell::{PersistedCell, Write};
pub use reducer::{CellSource, CountAction, Reducer, ReducerHandle, count_reducer};

/// Storage key the counter is persisted under unless configured otherwise.
pub const DEFAULT_KEY: &str = "count";

/// What a consumer sees when it looks at a cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Snapshot<T> {
    Loading,
    Ready(T),
}

impl<T> Snapshot<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Snapshot::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Snapshot::Ready(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Snapshot::Ready(value) => Some(value),
            Snapshot::Loading => None,
        }
    }
}

/// Hydration progress of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Storage has not been asked yet, or the last load failed.
    Uninitialized,
    Hydrating,
    Ready,
}
