use tracing::debug;

use super::View;
use crate::error::Result;
use crate::state::{CountAction, PersistedCell, ReducerHandle, Snapshot, count_reducer};

/// Mutates the counter by dispatching [`CountAction`]s.
///
/// Buttons are action tags. A tag that is not a known action is rejected
/// before the reducer runs, so the counter never sees it.
pub struct ReducerView {
    handle: ReducerHandle<i64, CountAction>,
}

impl ReducerView {
    pub fn new(cell: PersistedCell<i64>) -> Self {
        Self {
            handle: ReducerHandle::new(cell, count_reducer),
        }
    }
}

impl View for ReducerView {
    fn id(&self) -> &str {
        super::ids::REDUCER
    }

    fn name(&self) -> &str {
        "reducer"
    }

    fn label(&self) -> &str {
        "Count with storage and reducer"
    }

    fn snapshot(&self) -> Snapshot<i64> {
        self.handle.cell().read()
    }

    fn press(&self, button: &str) -> Result<()> {
        let action: CountAction = button.parse()?;
        let next = self.handle.dispatch(action)?;
        debug!(view = self.id(), ?action, next, "dispatched");
        Ok(())
    }
}
