use std::fmt::Write as _;

use crate::actions::View;
use crate::state::Snapshot;

/// Shown in place of a value while the counter is still loading.
pub const LOADING: &str = "loading...";

/// Render one view as a single line: `"<label>: <value>"`.
pub fn render_view(view: &dyn View) -> String {
    render_line(view.label(), &view.snapshot())
}

pub fn render_line(label: &str, snapshot: &Snapshot<i64>) -> String {
    match snapshot {
        Snapshot::Ready(value) => format!("{label}: {value}"),
        Snapshot::Loading => LOADING.to_string(),
    }
}

/// Render every view, one per line.
///
/// Views share one cell, so while it loads the whole frame collapses to a
/// single loading line.
pub fn render_frame(views: &[Box<dyn View>]) -> String {
    let mut out = String::new();
    if views.iter().any(|v| v.snapshot().is_loading()) {
        out.push_str(LOADING);
        out.push('\n');
        return out;
    }
    for view in views {
        let _ = writeln!(out, "{}", render_view(view.as_ref()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{reducer::ReducerView, simple::SimpleView};
    use crate::state::PersistedCell;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn ready_line() {
        assert_eq!(render_line("Count with storage", &Snapshot::Ready(-3)), "Count with storage: -3");
    }

    fn views(cell: &PersistedCell<i64>) -> Vec<Box<dyn View>> {
        vec![
            Box::new(SimpleView::new(cell.clone())),
            Box::new(ReducerView::new(cell.clone())),
        ]
    }

    #[tokio::test]
    async fn loading_cell_collapses_the_frame() {
        let cell = PersistedCell::new("count", 0i64, Arc::new(MemoryStorage::new()));
        assert_eq!(render_frame(&views(&cell)), "loading...\n");
    }

    #[tokio::test]
    async fn ready_frame_has_a_line_per_view() {
        let cell = PersistedCell::detached(4i64);
        assert_eq!(
            render_frame(&views(&cell)),
            "Count with storage: 4\nCount with storage and reducer: 4\n"
        );
    }

    #[test]
    fn loading_line() {
        assert_eq!(render_line("Count with storage", &Snapshot::Loading), LOADING);
    }
}
