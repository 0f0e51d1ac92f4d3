//! Terminal front end: draws the shared space and feeds key presses to
//! the engine's input source.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use super::input::KeyboardInput;
use super::widgets::SpaceView;
use crate::app::engine::EngineCommand;
use crate::scene::SceneModel;
use crate::Error;

/// Run the terminal loop until the user quits, then ask the engine to
/// shut down.
pub async fn run(
    model: Arc<Mutex<SceneModel>>,
    input: KeyboardInput,
    command_tx: mpsc::Sender<EngineCommand>,
) -> Result<(), Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        {
            let model = model.lock().unwrap();
            terminal.draw(|f| draw(f, &model))?;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                let quit = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                    || (key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('c'));
                if quit {
                    break;
                }
                input.press(key.code);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("terminal closed, requesting shutdown");
    let _ = command_tx.send(EngineCommand::Shutdown).await;
    Ok(())
}

fn draw(f: &mut Frame, model: &SceneModel) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(f.size());

    let position = model
        .local_position()
        .map(|p| format!("({:.1}, {:.1})", p.x, p.z))
        .unwrap_or_else(|| "joining...".to_string());
    let status = Paragraph::new(format!(
        "WASD/arrows to move, q to quit | you: {} | {} peers nearby",
        position,
        model.remote_count()
    ))
    .block(Block::default().borders(Borders::ALL).title("atrium"));
    f.render_widget(status, chunks[0]);

    let sprites = model.sprites();
    let view = SpaceView::new(&sprites)
        .block(Block::default().borders(Borders::ALL).title("shared space"));
    f.render_widget(view, chunks[1]);
}
