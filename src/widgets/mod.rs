use std::{io, time::Duration};

use color_eyre::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, EventStream},
    execute,
};
use ratatui::DefaultTerminal;
use tokio_stream::StreamExt;

mod grid;
pub mod theme;

pub use grid::GridView;
use theme::Theme;

pub struct App {
    view: GridView,
    theme: Theme,
}

impl App {
    const FRAMES_PER_SECOND: f32 = 30.0;

    pub fn new(view: GridView) -> Self {
        Self {
            view,
            theme: Theme::detect(),
        }
    }

    pub async fn run_tui(self) -> Result<()> {
        let terminal = ratatui::init();
        execute!(io::stdout(), EnableMouseCapture)?;
        let app_result = self.run(terminal).await;
        if let Err(err) = execute!(io::stdout(), DisableMouseCapture) {
            tracing::warn!(error = %err, "Failed to release mouse capture");
        }
        ratatui::restore();
        app_result
    }

    async fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let period = Duration::from_secs_f32(1.0 / Self::FRAMES_PER_SECOND);
        let mut interval = tokio::time::interval(period);
        let mut events = EventStream::new();

        while !self.view.should_quit() {
            tokio::select! {
                _ = interval.tick() => {
                    terminal.draw(|frame| self.view.render(frame, &self.theme))?;
                },
                Some(Ok(event)) = events.next() => {
                    if !self.view.handle_event(&event) {
                        tracing::trace!(?event, "Unhandled event");
                    }
                },
            }
        }
        Ok(())
    }
}
