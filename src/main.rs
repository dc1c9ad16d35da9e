use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use game_poll_board::config::Config;
use game_poll_board::feed::{spawn_poller, stop_poller};
use game_poll_board::resolve::DisplayEntry;
use game_poll_board::state::{self, AppState, PollCommand, apply_delta, vote_label};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<PollCommand>,
}

impl App {
    fn new(cmd_tx: mpsc::Sender<PollCommand>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.send(PollCommand::RefreshNow, "[INFO] Refresh requested")
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.send(PollCommand::ClearImageCache, "[INFO] Image cache clear requested")
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn send(&mut self, cmd: PollCommand, announce: &str) {
        if self.cmd_tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Poller is not running");
        } else {
            self.state.push_log(announce);
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let config = Config::from_env();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let poller = spawn_poller(&config, tx, cmd_rx);

    let mut app = App::new(cmd_tx);
    app.state.push_log(format!(
        "[INFO] Polling every {}s",
        config.poll_interval.as_secs()
    ));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if !stop_poller(poller, &app.cmd_tx, SHUTDOWN_GRACE) {
        eprintln!("poller still busy after {}s, exiting", SHUTDOWN_GRACE.as_secs());
    }

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    if app.state.show_loading() {
        let loading = Paragraph::new("Chargement...")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD));
        frame.render_widget(loading, centered_rect(40, 20, chunks[1]));
    } else {
        render_board(frame, chunks[1], &app.state);
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new("r Refresh | c Clear images | ? Help | q Quit");
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let status = if state.loading { "polling..." } else { "idle" };
    let updated = state.last_updated.as_deref().unwrap_or("never");
    format!(
        "TOP 10 JEUX | updated {updated} | poll #{} | {status} | {} cached images",
        state.generation, state.cached_images
    )
}

fn render_board(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(1)])
        .split(area);

    render_podium(frame, rows[0], state.podium());
    render_others(frame, rows[1], state.others());
}

fn render_podium(frame: &mut Frame, area: Rect, podium: &[DisplayEntry]) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    // Second | first | third, with the winner standing tallest.
    let slots = [(1usize, 2u16, columns[0]), (0, 0, columns[1]), (2, 3, columns[2])];
    for (idx, drop, column) in slots {
        let Some(entry) = podium.get(idx) else {
            continue;
        };
        let step = Rect {
            y: column.y.saturating_add(drop),
            height: column.height.saturating_sub(drop),
            ..column
        };
        let text = format!(
            "{}\n{}\n{}",
            entry.name,
            vote_label(entry.votes),
            entry.image_url
        );
        let item = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .style(entry_style(entry, podium_color(idx)))
            .block(
                Block::default()
                    .title(format!(" {} ", idx + 1))
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL),
            );
        frame.render_widget(item, step);
    }
}

fn render_others(frame: &mut Frame, area: Rect, others: &[DisplayEntry]) {
    let block = Block::default().title("Classement").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let constraints = others
        .iter()
        .map(|_| Constraint::Length(1))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect::<Vec<_>>();
    let lines = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, entry) in others.iter().enumerate() {
        let rank = i + 4;
        let text = format!(
            "{rank:>2}. {:<28} {:>9}  {}",
            truncate(&entry.name, 28),
            vote_label(entry.votes),
            entry.image_url
        );
        let line = Paragraph::new(text).style(entry_style(entry, Color::Reset));
        frame.render_widget(line, lines[i]);
    }
}

fn entry_style(entry: &DisplayEntry, color: Color) -> Style {
    if entry.is_placeholder {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}

fn podium_color(idx: usize) -> Color {
    match idx {
        0 => Color::Yellow,
        1 => Color::White,
        _ => Color::LightRed,
    }
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let mut out = raw.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(50, 50, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Game Poll Board - Help",
        "",
        "  r            Poll the sheet now",
        "  c            Forget cached images and re-resolve",
        "  ?            Toggle help",
        "  q / Esc      Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
