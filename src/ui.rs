//! Terminal frontend: a cell canvas drawn with ratatui, keys read with crossterm.

use crate::board::{HEIGHT, NPARTS, WIDTH};
use crate::frontend::Frontend;
use crate::input::{Key, key_to_action};
use crate::piece::Colour;
use crossterm::event::{self, Event};
use ratatui::DefaultTerminal;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Paragraph, Widget};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Canvas bounds in board coordinates (inclusive): left wall, floor, and room
/// for the preview box to the right of the board.
const CANVAS_LEFT: i32 = -1;
const CANVAS_RIGHT: i32 = WIDTH as i32 + 2 + NPARTS as i32;
const CANVAS_TOP: i32 = NPARTS as i32;
const CANVAS_BOTTOM: i32 = HEIGHT as i32;
const CANVAS_COLS: usize = (CANVAS_RIGHT - CANVAS_LEFT + 1) as usize;
const CANVAS_ROWS: usize = (CANVAS_BOTTOM - CANVAS_TOP + 1) as usize;

/// Each board cell is two terminal columns wide.
const CELL_WIDTH: u16 = 2;
/// Extra columns right of the canvas for the score line.
const STATUS_SLACK: u16 = 16;
/// Column where the score line starts (above the preview box).
const STATUS_COLUMN: i32 = WIDTH as i32 + 2;

/// Longest single wait on the event queue, so signals are noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(50);
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const MESSAGE_FADE_MS: u32 = 600;

/// Colours of the visible part of the board plus walls and preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    cells: Vec<Colour>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            cells: vec![Colour::Default; CANVAS_COLS * CANVAS_ROWS],
        }
    }

    fn index(x: i32, y: i32) -> Option<usize> {
        if !(CANVAS_LEFT..=CANVAS_RIGHT).contains(&x) || !(CANVAS_TOP..=CANVAS_BOTTOM).contains(&y)
        {
            return None;
        }
        let col = (x - CANVAS_LEFT) as usize;
        let row = (y - CANVAS_TOP) as usize;
        Some(row * CANVAS_COLS + col)
    }

    /// Hidden-buffer rows and anything off the canvas are dropped.
    pub fn set(&mut self, x: i32, y: i32, colour: Colour) {
        if let Some(i) = Self::index(x, y) {
            self.cells[i] = colour;
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Colour> {
        Self::index(x, y).map(|i| self.cells[i])
    }

    pub fn clear(&mut self) {
        self.cells.fill(Colour::Default);
    }
}

fn cell_style(colour: Colour) -> Style {
    let bg = match colour {
        Colour::Default => return Style::reset(),
        Colour::Inverted => return Style::reset().add_modifier(Modifier::REVERSED),
        Colour::Background => Color::Black,
        Colour::Red => Color::Red,
        Colour::Green => Color::Green,
        Colour::Yellow => Color::Yellow,
        Colour::Blue => Color::Blue,
        Colour::Magenta => Color::Magenta,
        Colour::Cyan => Color::Cyan,
        Colour::Grey => Color::Gray,
    };
    Style::default().bg(bg)
}

/// Canvas placement: centered in `area`, clipped to it.
fn scene_rect(area: Rect) -> Rect {
    let width = CANVAS_COLS as u16 * CELL_WIDTH + STATUS_SLACK;
    let height = CANVAS_ROWS as u16;
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(width),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    vert[1].intersection(area)
}

/// Screen position of board cell (x, y) within `scene`.
fn cell_position(scene: Rect, x: i32, y: i32) -> Position {
    Position {
        x: scene.x + (x - CANVAS_LEFT) as u16 * CELL_WIDTH,
        y: scene.y + (y - CANVAS_TOP) as u16,
    }
}

/// Draw canvas, score line and message into `buf`. Returns the message area, if any.
fn render_scene(
    buf: &mut Buffer,
    area: Rect,
    canvas: &Canvas,
    status: &str,
    message: Option<&str>,
) -> Option<Rect> {
    let scene = scene_rect(area);
    for y in CANVAS_TOP..=CANVAS_BOTTOM {
        for x in CANVAS_LEFT..=CANVAS_RIGHT {
            let pos = cell_position(scene, x, y);
            if !scene.contains(pos) {
                continue;
            }
            let colour = canvas.get(x, y).unwrap_or_default();
            let room = usize::from(scene.right() - pos.x);
            buf.set_stringn(pos.x, pos.y, "  ", room, cell_style(colour));
        }
    }

    let status_pos = cell_position(scene, STATUS_COLUMN, CANVAS_TOP);
    let status_rect = Rect::new(
        status_pos.x,
        status_pos.y,
        area.right().saturating_sub(status_pos.x),
        1,
    )
    .intersection(area);
    Paragraph::new(status).render(status_rect, buf);

    let text = message?;
    let left = cell_position(scene, 0, HEIGHT as i32 / 2);
    let message_rect = Rect::new(left.x, left.y, WIDTH as u16 * CELL_WIDTH, 1).intersection(area);
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .render(message_rect, buf);
    Some(message_rect)
}

/// crossterm/ratatui implementation of [`Frontend`].
pub struct TerminalFrontend {
    terminal: DefaultTerminal,
    canvas: Canvas,
    status: String,
    message: Option<String>,
    message_fx: Option<Effect>,
    last_fx_tick: Option<Instant>,
    interrupted: Arc<AtomicBool>,
}

impl TerminalFrontend {
    /// Expects the terminal to already be in raw mode. `interrupted` is set by
    /// the signal handler and turns into a quit key.
    pub fn new(terminal: DefaultTerminal, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            terminal,
            canvas: Canvas::new(),
            status: String::new(),
            message: None,
            message_fx: None,
            last_fx_tick: None,
            interrupted,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Frontend for TerminalFrontend {
    fn clear_screen(&mut self) -> io::Result<()> {
        self.canvas.clear();
        self.message = None;
        self.message_fx = None;
        self.terminal.clear()
    }

    fn draw_cell(&mut self, x: i32, y: i32, colour: Colour) {
        self.canvas.set(x, y, colour);
    }

    fn flush_output(&mut self) -> io::Result<()> {
        let now = Instant::now();
        let delta = self
            .last_fx_tick
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        self.last_fx_tick = Some(now);
        let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;

        let Self {
            terminal,
            canvas,
            status,
            message,
            message_fx,
            ..
        } = self;
        terminal.draw(|frame| {
            let area = frame.area();
            let message_rect =
                render_scene(frame.buffer_mut(), area, canvas, status, message.as_deref());
            if let (Some(rect), Some(effect)) = (message_rect, message_fx.as_mut()) {
                frame.render_effect(effect, rect, TfxDuration::from_millis(delta_ms));
            }
        })?;
        if self.message_fx.as_ref().is_some_and(Effect::done) {
            self.message_fx = None;
        }
        Ok(())
    }

    fn draw_text(&mut self, text: &str) {
        self.message = Some(text.to_owned());
        self.message_fx = Some(fx::fade_from(
            Color::Black,
            Color::Black,
            (MESSAGE_FADE_MS, Interpolation::Linear),
        ));
        self.last_fx_tick = None;
    }

    fn draw_score(&mut self, score: u64, level: u32, seconds_remaining: u64) {
        self.status = format!("score: {score} level: {level} {seconds_remaining:03}");
    }

    fn read_key(&mut self, timeout: Option<Duration>) -> io::Result<Option<Key>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.is_interrupted() {
                return Ok(Some(Key::Quit));
            }
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(None);
                    }
                    left.min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            if !event::poll(slice)? {
                continue;
            }
            match event::read()? {
                Event::Key(key) => {
                    if let Some(key) = key_to_action(key) {
                        return Ok(Some(key));
                    }
                }
                Event::Resize(..) => self.flush_output()?,
                _ => {}
            }
        }
    }

    fn hold(&mut self, duration: Duration) -> io::Result<()> {
        let until = Instant::now() + duration;
        loop {
            self.flush_output()?;
            let left = until.saturating_duration_since(Instant::now());
            if left.is_zero() || self.is_interrupted() {
                return Ok(());
            }
            std::thread::sleep(left.min(FRAME_INTERVAL));
        }
    }
}
