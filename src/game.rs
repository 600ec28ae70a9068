// src/game.rs
use crate::error::{GameError, GameResult};
use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Stone,
    Paper,
    Scissors,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Stone, Action::Paper, Action::Scissors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Stone => "STONE",
            Action::Paper => "PAPER",
            Action::Scissors => "SCISSORS",
        }
    }

    pub fn beats(self, other: Action) -> bool {
        matches!(
            (self, other),
            (Action::Stone, Action::Scissors)
                | (Action::Scissors, Action::Paper)
                | (Action::Paper, Action::Stone)
        )
    }

    /// Uniform draw over the three actions.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Action {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    PlayerWins,
    ComputerWins,
    Tie,
}

pub fn judge(chosen: Action, opposing: Action) -> Outcome {
    if chosen.beats(opposing) {
        Outcome::PlayerWins
    } else if opposing.beats(chosen) {
        Outcome::ComputerWins
    } else {
        Outcome::Tie
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScorePair {
    pub player: u32,
    pub computer: u32,
}

impl ScorePair {
    pub fn apply(self, outcome: Outcome) -> ScorePair {
        match outcome {
            Outcome::PlayerWins => ScorePair { player: self.player.saturating_add(1), ..self },
            Outcome::ComputerWins => ScorePair { computer: self.computer.saturating_add(1), ..self },
            Outcome::Tie => self,
        }
    }
}

/// What happens when an action arrives while another round is still shaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPolicy {
    /// Reject the new action until the current round resolves.
    Serialize,
    /// Start an independent timer for every action.
    Overlap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub chosen: Action,
    pub opposing: Action,
    pub outcome: Outcome,
    pub score: ScorePair,
    pub resolved_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRound {
    chosen: Action,
    started: Instant,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundPhase {
    Idle,
    Shaking { chosen: Action, progress: f32 },
}

pub struct GameSession {
    score: ScorePair,
    pending: VecDeque<PendingRound>,
    shake: Duration,
    policy: RoundPolicy,
    player_hand: Option<Action>,
    computer_hand: Option<Action>,
    history: Vec<RoundRecord>,
}

impl GameSession {
    pub fn new(shake: Duration, policy: RoundPolicy) -> Self {
        Self {
            score: ScorePair::default(),
            pending: VecDeque::new(),
            shake,
            policy,
            player_hand: None,
            computer_hand: None,
            history: Vec::new(),
        }
    }

    pub fn score(&self) -> ScorePair {
        self.score
    }

    pub fn player_hand(&self) -> Option<Action> {
        self.player_hand
    }

    pub fn computer_hand(&self) -> Option<Action> {
        self.computer_hand
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn policy(&self) -> RoundPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: RoundPolicy) {
        self.policy = policy;
    }

    /// Starts the shake for `chosen`. Nothing about the score changes here.
    pub fn play(&mut self, chosen: Action, now: Instant) -> GameResult<()> {
        if self.policy == RoundPolicy::Serialize && !self.pending.is_empty() {
            return Err(GameError::RoundInProgress);
        }
        self.pending.push_back(PendingRound {
            chosen,
            started: now,
            deadline: now + self.shake,
        });
        tracing::debug!("Round started with {}", chosen.as_str());
        Ok(())
    }

    pub fn phase(&self, now: Instant) -> RoundPhase {
        match self.pending.back() {
            None => RoundPhase::Idle,
            Some(round) => {
                let elapsed = now.saturating_duration_since(round.started).as_secs_f32();
                let total = self.shake.as_secs_f32();
                let progress = if total > 0.0 { (elapsed / total).min(1.0) } else { 1.0 };
                RoundPhase::Shaking { chosen: round.chosen, progress }
            }
        }
    }

    pub fn advance<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Vec<RoundRecord> {
        self.advance_with(now, || Action::random(rng))
    }

    /// Resolves every round whose shake has finished, in start order,
    /// asking `draw` for each opposing action.
    pub fn advance_with(&mut self, now: Instant, mut draw: impl FnMut() -> Action) -> Vec<RoundRecord> {
        let mut resolved = Vec::new();
        while let Some(round) = self.pending.front().copied() {
            if now < round.deadline {
                break;
            }
            self.pending.pop_front();
            let opposing = draw();
            let outcome = judge(round.chosen, opposing);
            self.score = self.score.apply(outcome);
            self.player_hand = Some(round.chosen);
            self.computer_hand = Some(opposing);

            let record = RoundRecord {
                chosen: round.chosen,
                opposing,
                outcome,
                score: self.score,
                resolved_at: Local::now(),
            };
            tracing::info!(
                "{} vs {}: {:?} (player {}, computer {})",
                round.chosen.as_str(),
                opposing.as_str(),
                outcome,
                self.score.player,
                self.score.computer
            );
            self.history.push(record.clone());
            resolved.push(record);
        }
        resolved
    }
}
