//! Game session: spawn, falling frames, lock, clear, level-up and game over.

use crate::board::{Board, HEIGHT, NPARTS, WIDTH};
use crate::clock::{Clock, LevelTimer, frame_delay};
use crate::frontend::Frontend;
use crate::input::Key;
use crate::piece::{Colour, Piece};
use crate::scoring::Scoreboard;
use anyhow::Result;
use rand::rngs::StdRng;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info};

/// Anchor for a newly spawned piece. Two rows down keeps every rotation of
/// every shape inside the hidden buffer.
pub const SPAWN_X: i32 = WIDTH as i32 / 2;
pub const SPAWN_Y: i32 = NPARTS as i32 / 2;

/// A piece that cannot descend while its anchor is above this row ends the game.
const LOCK_LIMIT: i32 = NPARTS as i32 + 1;

/// Top-left of the preview box and the preview piece anchor.
const PREVIEW_BOX: (i32, i32) = (WIDTH as i32 + 2, 6);
const PREVIEW_ANCHOR: (i32, i32) = (WIDTH as i32 + 4, 8);

/// How long the level announcement and the game-over message stay up.
const ANNOUNCE_HOLD: Duration = Duration::from_secs(2);

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawn,
    Falling,
    Locking,
    Clearing,
    LevelUp,
    GameOver,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    GameOver,
    Quit,
}

/// Final result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: EndReason,
    pub score: u64,
    pub level: u32,
}

/// Owns all game state; the frontend only ever sees draw calls.
pub struct Session<F, C> {
    frontend: F,
    clock: C,
    rng: StdRng,
    board: Board,
    piece: Piece,
    preview: Piece,
    x: i32,
    y: i32,
    scoreboard: Scoreboard,
    level: u32,
    level_timer: LevelTimer,
    phase: Phase,
}

impl<F: Frontend, C: Clock> Session<F, C> {
    pub fn new(frontend: F, clock: C, mut rng: StdRng, level: u32) -> Self {
        let preview = Piece::sample(&mut rng);
        let level_timer = LevelTimer::start(clock.now());
        Self {
            frontend,
            clock,
            rng,
            board: Board::new(),
            // Replaced by the preview on the first spawn.
            piece: preview,
            preview,
            x: SPAWN_X,
            y: SPAWN_Y,
            scoreboard: Scoreboard::new(),
            level: level.max(1),
            level_timer,
            phase: Phase::Spawn,
        }
    }

    #[cfg(test)]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub const fn score(&self) -> u64 {
        self.scoreboard.score()
    }

    #[cfg(test)]
    pub const fn level(&self) -> u32 {
        self.level
    }

    #[cfg(test)]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Play until game over or quit.
    pub fn run(&mut self) -> Result<Outcome> {
        info!(level = self.level, "session started");
        self.frontend.clear_screen()?;
        self.draw_board();
        self.draw_score();
        loop {
            match self.step()? {
                Phase::GameOver => {
                    self.frontend.draw_text("Game over");
                    self.frontend.flush_output()?;
                    self.frontend.hold(ANNOUNCE_HOLD)?;
                    return Ok(self.outcome(EndReason::GameOver));
                }
                Phase::Quit => return Ok(self.outcome(EndReason::Quit)),
                _ => {}
            }
        }
    }

    /// Run one state transition and return the new phase.
    pub fn step(&mut self) -> Result<Phase> {
        self.phase = match self.phase {
            Phase::Spawn => self.spawn()?,
            Phase::Falling => self.fall()?,
            Phase::Locking => self.lock()?,
            Phase::Clearing => self.clear(),
            Phase::LevelUp => self.level_up()?,
            terminal @ (Phase::GameOver | Phase::Quit) => terminal,
        };
        Ok(self.phase)
    }

    fn outcome(&self, reason: EndReason) -> Outcome {
        info!(?reason, score = self.score(), level = self.level, "session ended");
        Outcome {
            reason,
            score: self.score(),
            level: self.level,
        }
    }

    /// Promote the preview, draw a new one and place the piece at the top.
    fn spawn(&mut self) -> Result<Phase> {
        self.piece = std::mem::replace(&mut self.preview, Piece::sample(&mut self.rng));
        self.draw_preview()?;
        self.x = SPAWN_X;
        self.y = SPAWN_Y;
        if !self.board.is_valid(&self.piece, self.x, self.y) {
            info!(kind = ?self.piece.kind(), "spawn blocked");
            return Ok(Phase::GameOver);
        }
        Ok(Phase::Falling)
    }

    /// One frame: poll keys until the frame deadline, then try to descend a row.
    fn fall(&mut self) -> Result<Phase> {
        self.paint_piece()?;
        let deadline = self.clock.now() + frame_delay(self.level);
        while let Some(remaining) = deadline
            .checked_duration_since(self.clock.now())
            .filter(|left| !left.is_zero())
        {
            let Some(key) = self.frontend.read_key(Some(remaining))? else {
                continue;
            };
            if self.apply_key(key)?.is_break() {
                return Ok(Phase::Quit);
            }
        }

        if !self.board.is_valid(&self.piece, self.x, self.y + 1) {
            return Ok(Phase::Locking);
        }
        self.erase_piece();
        self.y += 1;
        self.draw_score();
        Ok(self.next_after_frame(Phase::Falling))
    }

    fn lock(&mut self) -> Result<Phase> {
        self.draw_piece(Colour::Inverted);
        self.frontend.flush_output()?;
        if self.y < LOCK_LIMIT {
            info!(x = self.x, y = self.y, "locked inside the hidden buffer");
            return Ok(Phase::GameOver);
        }
        self.board.lock(&self.piece, self.x, self.y);
        Ok(Phase::Clearing)
    }

    fn clear(&mut self) -> Phase {
        let cleared = self.board.clear_full_rows();
        let awarded = self.scoreboard.record_clear(cleared, self.level);
        if cleared > 0 {
            debug!(
                cleared,
                awarded,
                streak = self.scoreboard.streak(),
                "rows cleared"
            );
            self.draw_board();
        }
        self.draw_score();
        self.next_after_frame(Phase::Spawn)
    }

    fn level_up(&mut self) -> Result<Phase> {
        self.level = self.level.saturating_add(1);
        self.board.reset();
        info!(
            level = self.level,
            delay = ?frame_delay(self.level),
            "level up"
        );
        self.frontend.clear_screen()?;
        self.draw_board();
        self.frontend.draw_text(&format!("Level {}", self.level));
        self.frontend.flush_output()?;
        self.frontend.hold(ANNOUNCE_HOLD)?;
        self.level_timer.reset(self.clock.now());
        self.scoreboard.award_level_up(self.level);
        self.redraw()?;
        Ok(Phase::Spawn)
    }

    fn next_after_frame(&self, otherwise: Phase) -> Phase {
        if self.level_timer.expired(self.clock.now()) {
            Phase::LevelUp
        } else {
            otherwise
        }
    }

    fn apply_key(&mut self, key: Key) -> Result<ControlFlow<()>> {
        match key {
            Key::Quit => return Ok(ControlFlow::Break(())),
            Key::Pause => return self.pause(),
            Key::HardDrop => {
                let row = self.board.landing_row(&self.piece, self.x, self.y);
                self.try_move(self.piece, self.x, row)?;
            }
            Key::Rotate => {
                self.try_move(self.piece.rotated(), self.x, self.y)?;
            }
            Key::MoveLeft => {
                self.try_move(self.piece, self.x - 1, self.y)?;
            }
            Key::MoveRight => {
                self.try_move(self.piece, self.x + 1, self.y)?;
            }
            Key::SoftDrop => {
                self.try_move(self.piece, self.x, self.y + 1)?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Replace the active piece/anchor if the candidate placement is legal.
    fn try_move(&mut self, candidate: Piece, x: i32, y: i32) -> Result<bool> {
        if !self.board.is_valid(&candidate, x, y) {
            return Ok(false);
        }
        self.erase_piece();
        self.piece = candidate;
        self.x = x;
        self.y = y;
        self.paint_piece()?;
        Ok(true)
    }

    /// Block on the next key; the time spent paused is given back to the level timer.
    fn pause(&mut self) -> Result<ControlFlow<()>> {
        let started = self.clock.now();
        self.frontend.draw_text("Paused");
        self.frontend.flush_output()?;
        let key = self.frontend.read_key(None)?;
        let paused = self.clock.now().saturating_duration_since(started);
        self.level_timer.extend(paused);
        debug!(?paused, "resumed");
        if key == Some(Key::Quit) {
            return Ok(ControlFlow::Break(()));
        }
        self.redraw()?;
        self.paint_piece()?;
        Ok(ControlFlow::Continue(()))
    }

    fn draw_piece(&mut self, colour: Colour) {
        let Self {
            frontend, piece, x, y, ..
        } = self;
        for (cx, cy) in piece.cells_at(*x, *y) {
            frontend.draw_cell(cx, cy, colour);
        }
    }

    fn paint_piece(&mut self) -> Result<()> {
        self.draw_piece(self.piece.colour());
        self.frontend.flush_output()?;
        Ok(())
    }

    fn erase_piece(&mut self) {
        self.draw_piece(Colour::Default);
    }

    /// Board cells plus the walls and floor around them.
    fn draw_board(&mut self) {
        let (width, height) = (WIDTH as i32, HEIGHT as i32);
        for y in 0..=height {
            for x in -1..=width {
                let solid = x < 0 || x == width || y == height || self.board.is_occupied(x, y);
                let colour = if solid {
                    Colour::Inverted
                } else {
                    Colour::Default
                };
                self.frontend.draw_cell(x, y, colour);
            }
        }
    }

    fn draw_preview(&mut self) -> Result<()> {
        let (bx, by) = PREVIEW_BOX;
        let span = NPARTS as i32;
        for y in by..=by + span {
            for x in bx..=bx + span {
                self.frontend.draw_cell(x, y, Colour::Default);
            }
        }
        let (px, py) = PREVIEW_ANCHOR;
        for (cx, cy) in self.preview.cells_at(px, py) {
            self.frontend.draw_cell(cx, cy, self.preview.colour());
        }
        self.frontend.flush_output()?;
        Ok(())
    }

    fn draw_score(&mut self) {
        let remaining = self.level_timer.remaining_secs(self.clock.now());
        self.frontend
            .draw_score(self.scoreboard.score(), self.level, remaining);
    }

    /// Full repaint after something covered the board (pause, announcement).
    fn redraw(&mut self) -> Result<()> {
        self.frontend.clear_screen()?;
        self.draw_board();
        self.draw_score();
        self.draw_preview()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::FULL_ROW;
    use crate::clock::NEXT_LEVEL;
    use crate::piece::PieceKind;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::rc::Rc;
    use std::time::Instant;

    struct ManualClock {
        now: Cell<Instant>,
    }

    impl ManualClock {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                now: Cell::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for Rc<ManualClock> {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    /// Replays keys at scripted delays; waiting advances the shared clock.
    struct ScriptedFrontend {
        clock: Rc<ManualClock>,
        keys: VecDeque<(Duration, Key)>,
        cells: HashMap<(i32, i32), Colour>,
        texts: Vec<String>,
        held: Duration,
    }

    impl ScriptedFrontend {
        fn new(clock: Rc<ManualClock>, keys: &[(Duration, Key)]) -> Self {
            Self {
                clock,
                keys: keys.iter().copied().collect(),
                cells: HashMap::new(),
                texts: Vec::new(),
                held: Duration::ZERO,
            }
        }
    }

    impl Frontend for ScriptedFrontend {
        fn clear_screen(&mut self) -> io::Result<()> {
            self.cells.clear();
            Ok(())
        }

        fn draw_cell(&mut self, x: i32, y: i32, colour: Colour) {
            self.cells.insert((x, y), colour);
        }

        fn flush_output(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn draw_text(&mut self, text: &str) {
            self.texts.push(text.to_owned());
        }

        fn draw_score(&mut self, _score: u64, _level: u32, _seconds_remaining: u64) {}

        fn read_key(&mut self, timeout: Option<Duration>) -> io::Result<Option<Key>> {
            match (self.keys.front().copied(), timeout) {
                (Some((after, key)), limit) if limit.is_none_or(|limit| after <= limit) => {
                    self.keys.pop_front();
                    self.clock.advance(after);
                    Ok(Some(key))
                }
                (Some(_), Some(limit)) => {
                    if let Some((after, _)) = self.keys.front_mut() {
                        *after -= limit;
                    }
                    self.clock.advance(limit);
                    Ok(None)
                }
                (None, Some(limit)) => {
                    self.clock.advance(limit);
                    Ok(None)
                }
                (_, None) => panic!("blocking read with no scripted keys"),
            }
        }

        fn hold(&mut self, duration: Duration) -> io::Result<()> {
            self.held += duration;
            self.clock.advance(duration);
            Ok(())
        }
    }

    fn session(keys: &[(Duration, Key)]) -> (Session<ScriptedFrontend, Rc<ManualClock>>, Rc<ManualClock>) {
        let clock = ManualClock::new();
        let frontend = ScriptedFrontend::new(clock.clone(), keys);
        let session = Session::new(frontend, clock.clone(), StdRng::seed_from_u64(7), 1);
        (session, clock)
    }

    /// Put `kind` (unrotated) in play at (x, y).
    fn place(session: &mut Session<ScriptedFrontend, Rc<ManualClock>>, kind: PieceKind, x: i32, y: i32) {
        session.piece = Piece::new(kind);
        session.x = x;
        session.y = y;
        session.phase = Phase::Falling;
    }

    #[test]
    fn test_spawn_enters_falling_on_empty_board() {
        let (mut session, _) = session(&[]);
        let preview = session.preview;
        assert_eq!(session.step().unwrap(), Phase::Falling);
        assert_eq!(session.piece, preview);
        assert_eq!((session.x, session.y), (SPAWN_X, SPAWN_Y));
    }

    #[test]
    fn test_every_rotation_fits_at_spawn() {
        let board = Board::new();
        for kind in PieceKind::ALL {
            let mut piece = Piece::new(kind);
            for _ in 0..4 {
                assert!(board.is_valid(&piece, SPAWN_X, SPAWN_Y), "{piece:?}");
                piece.rotate();
            }
        }
    }

    #[test]
    fn test_blocked_spawn_is_game_over_without_falling() {
        let (mut session, _) = session(&[]);
        for y in 0..NPARTS {
            session.board.set_row(y, FULL_ROW);
        }
        assert_eq!(session.step().unwrap(), Phase::GameOver);
        assert_eq!(session.step().unwrap(), Phase::GameOver);
        let outcome = session.run().unwrap();
        assert_eq!(outcome.reason, EndReason::GameOver);
        assert_eq!(session.frontend.texts, vec!["Game over".to_string()]);
    }

    #[test]
    fn test_lock_inside_hidden_buffer_is_game_over() {
        let (mut session, _) = session(&[]);
        place(&mut session, PieceKind::O, 4, NPARTS as i32);
        session.board.set_row(NPARTS + 2, FULL_ROW & !1);
        assert_eq!(session.step().unwrap(), Phase::Locking);
        assert_eq!(session.step().unwrap(), Phase::GameOver);
        assert_eq!(session.board.row(NPARTS), 0, "nothing was locked");
    }

    #[test]
    fn test_frame_without_input_descends_one_row() {
        let (mut session, clock) = session(&[]);
        place(&mut session, PieceKind::T, 5, 8);
        let before = clock.now();
        assert_eq!(session.step().unwrap(), Phase::Falling);
        assert_eq!(session.y, 9);
        assert_eq!(clock.now() - before, frame_delay(1));
    }

    #[test]
    fn test_moves_are_checked_against_walls() {
        let (mut session, _) = session(&[]);
        place(&mut session, PieceKind::O, 0, 10);
        session.apply_key(Key::MoveLeft).unwrap();
        assert_eq!(session.x, 0);
        session.apply_key(Key::MoveRight).unwrap();
        assert_eq!(session.x, 1);
        session.apply_key(Key::SoftDrop).unwrap();
        assert_eq!(session.y, 11);
    }

    #[test]
    fn test_move_erases_old_footprint() {
        let (mut session, _) = session(&[]);
        place(&mut session, PieceKind::O, 3, 10);
        session.paint_piece().unwrap();
        session.apply_key(Key::MoveRight).unwrap();
        let cells = &session.frontend.cells;
        assert_eq!(cells[&(3, 10)], Colour::Default);
        assert_eq!(cells[&(4, 10)], Colour::Grey);
        assert_eq!(cells[&(5, 11)], Colour::Grey);
    }

    #[test]
    fn test_rotation_rejected_at_wall() {
        let (mut session, _) = session(&[]);
        place(&mut session, PieceKind::I, 5, 10);
        session.apply_key(Key::Rotate).unwrap();
        assert_eq!(session.piece, Piece::new(PieceKind::I).rotated());
        // Vertical I against the left wall cannot turn horizontal.
        session.x = 0;
        session.apply_key(Key::Rotate).unwrap();
        assert_eq!(session.piece, Piece::new(PieceKind::I).rotated());
    }

    #[test]
    fn test_hard_drop_line_piece_lands_on_floor() {
        let (mut session, _) = session(&[]);
        place(&mut session, PieceKind::I, SPAWN_X, NPARTS as i32);
        session.apply_key(Key::HardDrop).unwrap();
        assert_eq!(session.y, HEIGHT as i32 - 1);

        assert_eq!(session.step().unwrap(), Phase::Locking);
        assert_eq!(session.step().unwrap(), Phase::Clearing);
        assert_eq!(session.step().unwrap(), Phase::Spawn);
        let bottom = session.board.row(HEIGHT - 1);
        assert_eq!(bottom, 0b00_1111_0000, "columns 4..=7");
        assert_eq!(bottom.count_ones(), 4);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn test_completed_row_is_cleared_and_scored() {
        let (mut session, _) = session(&[]);
        let bottom = HEIGHT - 1;
        // Gap under columns 4..=7, filled by a horizontal I.
        session.board.set_row(bottom, FULL_ROW & !0b00_1111_0000);
        session.board.set_row(bottom - 1, 0b1);
        place(&mut session, PieceKind::I, SPAWN_X, bottom as i32);
        assert_eq!(session.step().unwrap(), Phase::Locking);
        assert_eq!(session.step().unwrap(), Phase::Clearing);
        assert_eq!(session.step().unwrap(), Phase::Spawn);
        assert_eq!(session.board.row(bottom), 0b1);
        assert_eq!(session.score(), 1);
        assert_eq!(session.scoreboard.streak(), 0);
    }

    #[test]
    fn test_pause_extends_level_countdown_exactly() {
        let paused_for = Duration::from_secs(7);
        let (mut session, clock) = session(&[(paused_for, Key::MoveLeft)]);
        place(&mut session, PieceKind::O, 4, 10);
        let deadline = session.level_timer.deadline();
        let started = clock.now();

        let flow = session.apply_key(Key::Pause).unwrap();
        assert!(flow.is_continue());
        assert_eq!(clock.now() - started, paused_for);
        assert_eq!(session.level_timer.deadline(), deadline + paused_for);
        assert_eq!(session.x, 4, "the resume key is not applied");
        assert_eq!(session.frontend.texts, vec!["Paused".to_string()]);
    }

    #[test]
    fn test_quit_while_paused_ends_session() {
        let (mut session, _) = session(&[(Duration::from_secs(1), Key::Quit)]);
        place(&mut session, PieceKind::O, 4, 10);
        assert!(session.apply_key(Key::Pause).unwrap().is_break());
    }

    #[test]
    fn test_quit_key_ends_session() {
        let (mut session, _) = session(&[(Duration::from_millis(30), Key::Quit)]);
        let outcome = session.run().unwrap();
        assert_eq!(outcome.reason, EndReason::Quit);
        assert_eq!(outcome.level, 1);
        assert_eq!(session.phase(), Phase::Quit);
    }

    #[test]
    fn test_expired_timer_levels_up_with_fresh_board() {
        let (mut session, clock) = session(&[]);
        place(&mut session, PieceKind::O, 4, 10);
        session.board.set_row(HEIGHT - 1, 0b11);
        clock.advance(NEXT_LEVEL);
        assert_eq!(session.step().unwrap(), Phase::LevelUp);
        assert_eq!(session.step().unwrap(), Phase::Spawn);
        assert_eq!(session.level(), 2);
        assert!(session.board().is_empty());
        assert_eq!(session.score(), 8);
        assert_eq!(session.frontend.texts, vec!["Level 2".to_string()]);
        assert_eq!(session.frontend.held, ANNOUNCE_HOLD);
        assert_eq!(session.level_timer.deadline(), clock.now() + NEXT_LEVEL);
        assert_eq!(session.step().unwrap(), Phase::Falling);
    }

    #[test]
    fn test_unattended_session_reaches_game_over() {
        let (mut session, _) = session(&[]);
        let outcome = session.run().unwrap();
        assert_eq!(outcome.reason, EndReason::GameOver);
        assert!(!session.board().is_empty());
    }

    #[test]
    fn test_board_is_framed_by_walls_and_floor() {
        let (mut session, _) = session(&[]);
        session.draw_board();
        let cells = &session.frontend.cells;
        assert_eq!(cells[&(-1, 5)], Colour::Inverted);
        assert_eq!(cells[&(WIDTH as i32, 5)], Colour::Inverted);
        assert_eq!(cells[&(3, HEIGHT as i32)], Colour::Inverted);
        assert_eq!(cells[&(3, 5)], Colour::Default);
    }
}
