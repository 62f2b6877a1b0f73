//! A persisted counter shared between two views.
//!
//! The counter lives in a [`PersistedCell`]: views read it and mutate it,
//! every change is persisted to a [`Storage`] backend in the background, and
//! the stored value is loaded back the next time the application starts.
//! [`SimpleView`] sets the value directly, [`ReducerView`] dispatches
//! [`CountAction`]s through a reducer.

pub mod actions;
pub mod app;
pub mod config;
pub mod error;
pub mod render;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use actions::{View, reducer::ReducerView, simple::SimpleView};
pub use app::App;
pub use error::{Error, Result, StorageError};
pub use state::{
    CellSource, CountAction, PersistedCell, Phase, Reducer, ReducerHandle, Snapshot, Write, count_reducer,
};
pub use storage::{JsonFileStorage, MemoryStorage, Storage};

pub const APP_ID: &str = "icu.veelume.shared-counter";
