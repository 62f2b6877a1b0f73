use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::actions::View;
use crate::error::{Error, Result};
use crate::render::render_frame;
use crate::state::PersistedCell;

const HELP: &str = "\
commands:
  <view> <button>   press a button, e.g. `simple inc` or `reducer dec`
  show              redraw the counter
  help              this text
  quit              leave
";

/// Terminal front end: owns the shared cell and the views attached to it.
pub struct App {
    cell: PersistedCell<i64>,
    views: Vec<Box<dyn View>>,
}

#[derive(Debug)]
enum Flow {
    Redraw,
    Print(&'static str),
    Quit,
}

impl App {
    pub fn new(cell: PersistedCell<i64>) -> Self {
        Self {
            cell,
            views: Vec::new(),
        }
    }

    pub fn with_view(mut self, view: impl View + 'static) -> Self {
        self.views.push(Box::new(view));
        self
    }

    pub fn views(&self) -> &[Box<dyn View>] {
        &self.views
    }

    pub fn frame(&self) -> String {
        render_frame(&self.views)
    }

    fn execute(&self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let (Some(first), second) = (words.next(), words.next()) else {
            return Ok(Flow::Redraw);
        };
        if let Some(extra) = words.next() {
            return Err(Error::UnknownControl(extra.to_string()));
        }

        match (first, second) {
            ("quit" | "exit", None) => Ok(Flow::Quit),
            ("help", None) => Ok(Flow::Print(HELP)),
            ("show", None) => Ok(Flow::Redraw),
            (name, Some(button)) => {
                let view = self
                    .views
                    .iter()
                    .find(|v| v.name() == name)
                    .ok_or_else(|| Error::UnknownControl(name.to_string()))?;
                view.press(button)?;
                Ok(Flow::Redraw)
            }
            (other, None) => Err(Error::UnknownControl(other.to_string())),
        }
    }

    /// Read commands from `input` until it ends or `quit`, writing a frame
    /// after every command and whenever the cell changes underneath us.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut changes = self.cell.subscribe();
        let mut watching = true;

        changes.borrow_and_update();
        output.write_all(self.frame().as_bytes()).await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    debug!(command = %line.trim(), "input");
                    match self.execute(&line) {
                        Ok(Flow::Quit) => break,
                        Ok(Flow::Print(text)) => output.write_all(text.as_bytes()).await?,
                        Ok(Flow::Redraw) => {
                            changes.borrow_and_update();
                            output.write_all(self.frame().as_bytes()).await?;
                        }
                        Err(err) => {
                            warn!(command = %line.trim(), error = %err, "command rejected");
                            output.write_all(format!("error: {err}\n").as_bytes()).await?;
                        }
                    }
                }
                changed = changes.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    changes.borrow_and_update();
                    output.write_all(self.frame().as_bytes()).await?;
                }
            }
            output.flush().await?;
        }

        output.flush().await
    }
}
