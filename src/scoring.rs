//! Score and tetris-streak bookkeeping.

/// Rows in a tetris.
const TETRIS_ROWS: usize = 4;

/// Running score plus the count of consecutive 4-row clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    score: u64,
    streak: u32,
}

impl Scoreboard {
    pub const fn new() -> Self {
        Self { score: 0, streak: 0 }
    }

    #[inline]
    pub const fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub const fn streak(&self) -> u32 {
        self.streak
    }

    /// Score a lock that removed `cleared` rows at `level`. Returns the points awarded.
    ///
    /// A tetris pays `streak² × 16 × level` and extends the streak; a 1–3 row
    /// clear pays `cleared² × level` and breaks it.
    pub fn record_clear(&mut self, cleared: usize, level: u32) -> u64 {
        let level = u64::from(level);
        let rows = cleared as u64;
        let awarded = match cleared {
            0 => 0,
            TETRIS_ROWS => {
                self.streak = self.streak.saturating_add(1);
                let streak = u64::from(self.streak);
                streak * streak * rows * rows * level
            }
            1..TETRIS_ROWS => {
                self.streak = 0;
                rows * rows * level
            }
            // Only reachable from a pre-filled board; the streak is left alone.
            _ => rows * rows * level,
        };
        self.score = self.score.saturating_add(awarded);
        awarded
    }

    /// Level-up bonus of `2 × level²` for the level just reached.
    pub fn award_level_up(&mut self, level: u32) -> u64 {
        let level = u64::from(level);
        let awarded = 2 * level * level;
        self.score = self.score.saturating_add(awarded);
        awarded
    }
}
