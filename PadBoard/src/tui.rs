//! Terminal front-end: draws the pad grid and turns keys and clicks into
//! controller calls.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use padcontrol::{BoardView, Cell, Controller, GridView, Rgb, Severity, SoundBackend, StatusMessage};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use tracing::{debug, info};

use crate::keys::{Action, action_for_key};

pub struct App<B: SoundBackend + 'static> {
    controller: Controller<B>,
    base_url: String,
    cursor: Option<(u32, u32)>,
    /// Screen area of every cell, from the last draw. Used for mouse hits.
    cell_areas: Vec<(u32, u32, Rect)>,
}

impl<B: SoundBackend + 'static> App<B> {
    pub fn new(controller: Controller<B>, base_url: impl Into<String>) -> Self {
        let layout = controller.board().layout;
        let cursor = (layout.slots() > 0).then_some((1, 1));
        Self {
            controller,
            base_url: base_url.into(),
            cursor,
            cell_areas: Vec::new(),
        }
    }

    pub fn controller(&self) -> &Controller<B> {
        &self.controller
    }

    pub fn cursor(&self) -> Option<(u32, u32)> {
        self.cursor
    }

    /// Returns `true` when the application should quit.
    pub fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::StopAll => self.controller.stop_all(),
            Action::PlaySelected => {
                if let Some(id) = self.selected_pad_id() {
                    self.controller.play(&id);
                }
            }
            Action::StopSelected => {
                if let Some(id) = self.selected_pad_id() {
                    self.controller.stop(&id);
                }
            }
            Action::Move(rows, cols) => self.move_cursor(rows, cols),
            Action::Quit => return true,
        }
        false
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let Some((row, col)) = cell_at(&self.cell_areas, mouse.column, mouse.row) else {
            return;
        };
        self.cursor = Some((row, col));
        if let Some(id) = self.pad_id_at(row, col) {
            debug!(id = %id, row, col, "Pad clicked");
            self.controller.play(&id);
        }
    }

    pub fn on_tick(&mut self) {
        self.controller.pump(Instant::now());
    }

    fn move_cursor(&mut self, rows: i32, cols: i32) {
        let layout = self.controller.board().layout;
        let Some((row, col)) = self.cursor else {
            return;
        };
        let row = (row as i64 + rows as i64).clamp(1, layout.rows as i64) as u32;
        let col = (col as i64 + cols as i64).clamp(1, layout.cols as i64) as u32;
        self.cursor = Some((row, col));
    }

    fn pad_id_at(&self, row: u32, col: u32) -> Option<String> {
        let board = self.controller.board();
        if !board.layout.contains(row, col) {
            return None;
        }
        board.button_at(row, col).map(|button| button.id.clone())
    }

    fn selected_pad_id(&self) -> Option<String> {
        let (row, col) = self.cursor?;
        self.pad_id_at(row, col)
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let view = self.controller.view(Instant::now());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(f.size());

        self.draw_header(f, chunks[0], &view);
        self.draw_grid(f, chunks[1], &view.grid);
        self.draw_help_strip(f, chunks[2]);
        self.draw_status_line(f, chunks[3], view.status.as_ref());
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect, view: &BoardView) {
        let pads = view.grid.pads().count();
        let playing = view.grid.active_ids().len();
        let line = Line::from(vec![
            Span::styled(
                format!("{}x{}", view.grid.rows, view.grid.cols),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(format!("  {pads} pads | {playing} playing")),
        ]);
        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("PadBoard - {}", self.base_url)),
        );
        f.render_widget(paragraph, area);
    }

    fn draw_grid(&mut self, f: &mut ratatui::Frame<'_>, area: Rect, grid: &GridView) {
        self.cell_areas = cell_areas(area, grid.rows, grid.cols);
        if grid.is_empty() {
            let paragraph = Paragraph::new("No pads configured")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(paragraph, area);
            return;
        }

        for (row, col, cell_area) in &self.cell_areas {
            if let Some(cell) = grid.cell(*row, *col) {
                let selected = self.cursor == Some((*row, *col));
                draw_cell(f, *cell_area, cell, selected);
            }
        }
    }

    fn draw_help_strip(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let paragraph = Paragraph::new(Line::from(
            "Space/Esc=Stop all | Enter=Play | s=Stop | arrows/hjkl=Move | click=Play | q=Quit",
        ))
        .block(Block::default().borders(Borders::ALL).title("Keys"));
        f.render_widget(paragraph, area);
    }

    fn draw_status_line(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        status: Option<&StatusMessage>,
    ) {
        let paragraph = match status {
            Some(message) => {
                let color = match message.severity {
                    Severity::Success => Color::Green,
                    Severity::Error => Color::Red,
                };
                Paragraph::new(message.text.as_str())
                    .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            }
            None => Paragraph::new("").style(Style::default().fg(Color::Gray)),
        };
        f.render_widget(paragraph, area);
    }
}

fn draw_cell(f: &mut ratatui::Frame<'_>, area: Rect, cell: &Cell, selected: bool) {
    let (border_type, border_style) = if selected {
        (BorderType::Thick, Style::default().fg(Color::Yellow))
    } else {
        (BorderType::Plain, Style::default().fg(Color::DarkGray))
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    let inner_height = area.height.saturating_sub(2);

    let paragraph = match cell {
        Cell::Pad(pad) => {
            let background = if pad.active {
                pad.accent
            } else {
                pad.accent.dimmed()
            };
            let mut style = Style::default()
                .bg(to_color(background))
                .fg(to_color(background.contrast_text()));
            let text = if pad.active {
                style = style.add_modifier(Modifier::BOLD);
                format!("▶ {}", pad.label)
            } else {
                pad.label.clone()
            };
            Paragraph::new(centered_lines(text, inner_height))
                .style(style)
                .wrap(Wrap { trim: true })
        }
        Cell::Placeholder { label, .. } => {
            Paragraph::new(centered_lines(label.clone(), inner_height))
                .style(Style::default().fg(Color::DarkGray))
        }
    };
    f.render_widget(paragraph.alignment(Alignment::Center).block(block), area);
}

fn centered_lines(text: String, height: u16) -> Vec<Line<'static>> {
    let padding = height.saturating_sub(1) / 2;
    let mut lines = vec![Line::from(""); padding as usize];
    lines.push(Line::from(text));
    lines
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Splits `area` into `rows x cols` cells, row-major, 1-based coordinates.
pub fn cell_areas(area: Rect, rows: u32, cols: u32) -> Vec<(u32, u32, Rect)> {
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows); rows as usize])
        .split(area);

    let mut cells = Vec::with_capacity(rows as usize * cols as usize);
    for (r, row_area) in row_areas.iter().enumerate() {
        let col_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, cols); cols as usize])
            .split(*row_area);
        for (c, cell_area) in col_areas.iter().enumerate() {
            cells.push((r as u32 + 1, c as u32 + 1, *cell_area));
        }
    }
    cells
}

pub fn cell_at(areas: &[(u32, u32, Rect)], x: u16, y: u16) -> Option<(u32, u32)> {
    areas
        .iter()
        .find(|(_, _, area)| {
            x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
        })
        .map(|(row, col, _)| (*row, *col))
}

pub fn run_app<B: SoundBackend + 'static>(mut app: App<B>, tick_rate: Duration) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut last_tick = Instant::now();
    info!(tick_ms = tick_rate.as_millis() as u64, "Terminal UI started");

    loop {
        guard.terminal.draw(|f| app.draw(f))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(action) = action_for_key(&key) {
                        if app.handle_action(action) {
                            break;
                        }
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }

    info!("Terminal UI closed");
    Ok(())
}

/// Leaves raw mode, the alternate screen and mouse capture. Errors are
/// ignored: this also runs from the panic hook.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture, Show);
}

/// Raw-mode terminal for the grid, restored on drop.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let setup = execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .map_err(anyhow::Error::from)
            .and_then(|()| Ok(Terminal::new(CrosstermBackend::new(io::stdout()))?));
        match setup {
            Ok(terminal) => Ok(Self { terminal }),
            Err(err) => {
                restore_terminal();
                Err(err)
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}
