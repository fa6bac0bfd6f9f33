//! Drawing and input surface the game session talks to.

use crate::input::Key;
use crate::piece::Colour;
use std::io;
use std::time::Duration;

/// Terminal collaborator used by the session. Coordinates are board cells:
/// `x` is the column (walls at `-1` and `WIDTH`), `y` the row including the
/// hidden buffer.
pub trait Frontend {
    fn clear_screen(&mut self) -> io::Result<()>;

    /// Paint one cell. Cells in the hidden buffer or off the canvas are ignored.
    fn draw_cell(&mut self, x: i32, y: i32, colour: Colour);

    fn flush_output(&mut self) -> io::Result<()>;

    /// Centered message over the board; cleared by `clear_screen`.
    fn draw_text(&mut self, text: &str);

    fn draw_score(&mut self, score: u64, level: u32, seconds_remaining: u64);

    /// Wait for the next game key. `None` blocks until one arrives; otherwise
    /// returns `Ok(None)` when nothing arrived in time.
    fn read_key(&mut self, timeout: Option<Duration>) -> io::Result<Option<Key>>;

    /// Keep the current frame up for `duration`, letting animations run.
    fn hold(&mut self, duration: Duration) -> io::Result<()>;
}
