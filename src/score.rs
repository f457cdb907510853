use std::fmt;

use serde::Serialize;

use crate::difficulty::points_for;

/// Running tally for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scoreboard {
    pub correct: u32,
    pub incorrect: u32,
    pub points: u64,
    #[serde(skip)]
    made_mistake: bool,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called whenever a new round is shown.
    pub fn start_round(&mut self) {
        self.made_mistake = false;
    }

    /// Records a correct answer and returns the points it earned. Rounds with
    /// an earlier wrong pick still count as correct but earn nothing.
    pub fn record_success(&mut self, level: u8) -> u64 {
        self.correct = self.correct.saturating_add(1);
        if self.made_mistake {
            return 0;
        }
        let points = points_for(level);
        self.points = self.points.saturating_add(points);
        points
    }

    /// Records a wrong pick. Only the first mistake of a round counts.
    pub fn record_failure(&mut self) -> bool {
        if self.made_mistake {
            return false;
        }
        self.made_mistake = true;
        self.incorrect = self.incorrect.saturating_add(1);
        true
    }

    pub fn made_mistake(&self) -> bool {
        self.made_mistake
    }

    pub fn total(&self) -> u32 {
        self.correct.saturating_add(self.incorrect)
    }

    /// Share of correct answers, rounded down to a whole percent.
    pub fn percent(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (u64::from(self.correct) * 100 / u64::from(total)) as u32
    }
}

impl fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({}/{})", self.percent(), self.correct, self.total())
    }
}
