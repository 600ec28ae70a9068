// src/controller.rs - routes button presses and classifier results into the session
use crate::classifier::Classification;
use crate::error::{GameError, GameResult};
use crate::game::{Action, GameSession, RoundPolicy, RoundRecord};
use crate::gesture::{dispatch, Dispatch};
use rand::Rng;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

pub type ClassificationSender = Sender<GameResult<Classification>>;

/// Game state behind the window: the session, the status line and the
/// channel classification results come back on.
pub struct GameController {
    session: GameSession,
    status: String,
    classify_tx: ClassificationSender,
    classify_rx: Receiver<GameResult<Classification>>,
    classifying: bool,
    last_classification: Option<Classification>,
}

impl GameController {
    pub fn new(session: GameSession, status: impl Into<String>) -> Self {
        let (classify_tx, classify_rx) = mpsc::channel();
        Self {
            session,
            status: status.into(),
            classify_tx,
            classify_rx,
            classifying: false,
            last_classification: None,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn is_classifying(&self) -> bool {
        self.classifying
    }

    pub fn last_classification(&self) -> Option<&Classification> {
        self.last_classification.as_ref()
    }

    pub fn set_policy(&mut self, policy: RoundPolicy) {
        if policy != self.session.policy() {
            tracing::info!("Round policy set to {:?}", policy);
            self.session.set_policy(policy);
        }
    }

    pub fn advance<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Vec<RoundRecord> {
        self.session.advance(now, rng)
    }

    /// The single entry point for a played action, whether it came from a
    /// button or from a classified gesture.
    pub fn press(&mut self, action: Action, now: Instant) {
        match self.session.play(action, now) {
            Ok(()) => self.status = format!("You played {}", action.as_str()),
            Err(GameError::RoundInProgress) => {
                tracing::debug!("Ignoring {} while a round is shaking", action.as_str());
                self.status = "Wait for the current round to finish".to_string();
            }
            Err(e) => tracing::error!("Could not start round: {}", e),
        }
    }

    /// Marks a classification as in flight and hands out the sender its
    /// result must come back on.
    pub fn begin_classification(&mut self) -> ClassificationSender {
        self.classifying = true;
        self.classify_tx.clone()
    }

    pub fn poll_classifications(&mut self, now: Instant) {
        while let Ok(result) = self.classify_rx.try_recv() {
            self.classifying = false;
            match result {
                Ok(classification) => {
                    tracing::info!(
                        "Classified as {:?} ({:.0}%)",
                        classification.label,
                        classification.confidence() * 100.0
                    );
                    let label = classification.label.clone();
                    self.last_classification = Some(classification);
                    match dispatch(&label) {
                        Dispatch::Play(action) => self.press(action, now),
                        Dispatch::Ignored(label) => {
                            self.status = format!("Unrecognised gesture label {:?}", label)
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    self.status = "Classification failed".to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{RoundPhase, ScorePair};
    use std::time::Duration;

    const SHAKE: Duration = Duration::from_millis(900);

    fn controller(policy: RoundPolicy) -> GameController {
        GameController::new(GameSession::new(SHAKE, policy), "")
    }

    fn classified(label: &str) -> GameResult<Classification> {
        Ok(Classification {
            label: label.to_string(),
            class_index: 0,
            confidences: vec![(label.to_string(), 1.0)],
        })
    }

    #[test]
    fn stone_label_starts_a_stone_round() {
        let mut controller = controller(RoundPolicy::Serialize);
        let now = Instant::now();
        controller.begin_classification().send(classified("0")).unwrap();
        assert!(controller.is_classifying());

        controller.poll_classifications(now);
        assert!(!controller.is_classifying());
        assert_eq!(controller.last_classification().unwrap().label, "0");
        assert!(matches!(
            controller.session().phase(now),
            RoundPhase::Shaking { chosen: Action::Stone, .. }
        ));
        assert_eq!(controller.session().score(), ScorePair::default());

        controller.session.advance_with(now + SHAKE, || Action::Paper);
        assert_eq!(controller.session().score(), ScorePair { player: 0, computer: 1 });
        assert_eq!(controller.session().player_hand(), Some(Action::Stone));
        assert_eq!(controller.session().computer_hand(), Some(Action::Paper));
    }

    #[test]
    fn unknown_label_starts_nothing() {
        let mut controller = controller(RoundPolicy::Serialize);
        let now = Instant::now();
        controller.begin_classification().send(classified("7")).unwrap();
        controller.poll_classifications(now);

        assert_eq!(controller.session().phase(now), RoundPhase::Idle);
        assert!(controller.status().contains("7"));
        assert!(controller.session.advance_with(now + SHAKE, || Action::Paper).is_empty());
    }

    #[test]
    fn failed_classification_leaves_the_session_alone() {
        let mut controller = controller(RoundPolicy::Serialize);
        let now = Instant::now();
        controller
            .begin_classification()
            .send(Err(GameError::Classification("worker panicked".into())))
            .unwrap();
        controller.poll_classifications(now);

        assert!(!controller.is_classifying());
        assert_eq!(controller.status(), "Classification failed");
        assert_eq!(controller.session().phase(now), RoundPhase::Idle);
        assert_eq!(controller.session().score(), ScorePair::default());
        assert!(controller.session().history().is_empty());
    }

    #[test]
    fn gesture_during_shake_is_rejected_like_a_button() {
        let now = Instant::now();
        let later = now + Duration::from_millis(100);

        let mut by_button = controller(RoundPolicy::Serialize);
        by_button.press(Action::Stone, now);
        by_button.press(Action::Paper, later);

        let mut by_gesture = controller(RoundPolicy::Serialize);
        by_gesture.press(Action::Stone, now);
        by_gesture.begin_classification().send(classified("1")).unwrap();
        by_gesture.poll_classifications(later);

        assert_eq!(by_gesture.status(), by_button.status());
        for controller in [&mut by_button, &mut by_gesture] {
            let records = controller.session.advance_with(now + SHAKE, || Action::Scissors);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].chosen, Action::Stone);
            assert_eq!(controller.session().phase(now + SHAKE), RoundPhase::Idle);
        }
    }

    #[test]
    fn policy_change_reaches_the_session() {
        let mut controller = controller(RoundPolicy::Serialize);
        controller.set_policy(RoundPolicy::Overlap);
        assert_eq!(controller.session().policy(), RoundPolicy::Overlap);
    }
}
