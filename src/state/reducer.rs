use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::PersistedCell;
use crate::error::{Error, Result};

/// Computes the next state from the previous one and an action.
pub trait Reducer<T, A>: Send + Sync {
    fn reduce(&self, prev: &T, action: A) -> Result<T>;
}

impl<T, A, F> Reducer<T, A> for F
where
    F: Fn(&T, A) -> Result<T> + Send + Sync,
{
    fn reduce(&self, prev: &T, action: A) -> Result<T> {
        self(prev, action)
    }
}

/// Where a reducer handle gets its cell from.
pub enum CellSource<T> {
    /// Start a fresh, unpersisted cell from this value.
    Initial(T),
    /// Dispatch into a cell other consumers already share.
    Shared(PersistedCell<T>),
}

impl<T> CellSource<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn into_cell(self) -> PersistedCell<T> {
        match self {
            CellSource::Initial(value) => PersistedCell::detached(value),
            CellSource::Shared(cell) => cell,
        }
    }
}

impl<T> From<PersistedCell<T>> for CellSource<T> {
    fn from(cell: PersistedCell<T>) -> Self {
        CellSource::Shared(cell)
    }
}

/// A cell paired with a reducer; mutation happens only through
/// [`dispatch`](Self::dispatch).
pub struct ReducerHandle<T, A> {
    cell: PersistedCell<T>,
    reducer: Arc<dyn Reducer<T, A>>,
    _action: PhantomData<fn(A)>,
}

impl<T, A> Clone for ReducerHandle<T, A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            reducer: Arc::clone(&self.reducer),
            _action: PhantomData,
        }
    }
}

impl<T, A> ReducerHandle<T, A>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(source: impl Into<CellSource<T>>, reducer: impl Reducer<T, A> + 'static) -> Self {
        Self {
            cell: source.into().into_cell(),
            reducer: Arc::new(reducer),
            _action: PhantomData,
        }
    }

    pub fn cell(&self) -> &PersistedCell<T> {
        &self.cell
    }

    /// Run the reducer against the current value and store the result.
    /// A reducer error leaves the cell as it was.
    pub fn dispatch(&self, action: A) -> Result<T> {
        self.cell.try_update(|prev| self.reducer.reduce(prev, action))
    }
}

/// Counter actions. On the wire they are tagged objects, `{"type": "increment"}`;
/// the short tags `inc` and `dec` are accepted too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CountAction {
    #[serde(alias = "inc")]
    Increment,
    #[serde(alias = "dec")]
    Decrement,
}

impl FromStr for CountAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "inc" | "increment" => Ok(CountAction::Increment),
            "dec" | "decrement" => Ok(CountAction::Decrement),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

pub fn count_reducer(prev: &i64, action: CountAction) -> Result<i64> {
    Ok(match action {
        CountAction::Increment => prev.saturating_add(1),
        CountAction::Decrement => prev.saturating_sub(1),
    })
}
