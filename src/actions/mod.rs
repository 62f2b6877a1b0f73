pub mod reducer;
pub mod simple;

use crate::error::Result;
use crate::state::Snapshot;

pub mod ids {
    use crate::APP_ID;

    pub const SIMPLE: &str = const_format::concatcp!(APP_ID, ".simple");
    pub const REDUCER: &str = const_format::concatcp!(APP_ID, ".reducer");
}

/// A consumer of the shared counter: something that displays it and turns
/// button presses into mutations.
pub trait View: Send + Sync {
    /// Fully qualified id, see [`ids`].
    fn id(&self) -> &str;

    /// Short name commands address the view by.
    fn name(&self) -> &str;

    /// Text shown before the value.
    fn label(&self) -> &str;

    fn snapshot(&self) -> Snapshot<i64>;

    fn press(&self, button: &str) -> Result<()>;
}
