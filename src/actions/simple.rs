use tracing::debug;

use super::View;
use crate::error::{Error, Result};
use crate::state::{PersistedCell, Snapshot};

/// Mutates the counter through the cell's setter.
pub struct SimpleView {
    cell: PersistedCell<i64>,
}

impl SimpleView {
    pub fn new(cell: PersistedCell<i64>) -> Self {
        Self { cell }
    }
}

impl View for SimpleView {
    fn id(&self) -> &str {
        super::ids::SIMPLE
    }

    fn name(&self) -> &str {
        "simple"
    }

    fn label(&self) -> &str {
        "Count with storage"
    }

    fn snapshot(&self) -> Snapshot<i64> {
        self.cell.read()
    }

    fn press(&self, button: &str) -> Result<()> {
        let next = match button {
            "inc" => self.cell.update(|c| c.saturating_add(1))?,
            "dec" => self.cell.update(|c| c.saturating_sub(1))?,
            other => return Err(Error::UnknownControl(other.to_string())),
        };
        debug!(view = self.id(), button, next, "pressed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buttons_step_the_counter() {
        let view = SimpleView::new(PersistedCell::detached(0));
        view.press("inc").unwrap();
        view.press("inc").unwrap();
        view.press("dec").unwrap();
        assert_eq!(view.snapshot(), Snapshot::Ready(1));
    }

    #[tokio::test]
    async fn unknown_button() {
        let view = SimpleView::new(PersistedCell::detached(2));
        let err = view.press("reset").unwrap_err();
        assert!(matches!(err, Error::UnknownControl(_)));
        assert_eq!(view.snapshot(), Snapshot::Ready(2));
    }
}
