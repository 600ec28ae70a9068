// src/gesture.rs - turns the latest hand pose into a game action
use crate::classifier::{Classification, KnnClassifier};
use crate::error::{GameError, GameResult};
use crate::game::Action;
use crate::tracking::Hand;
use std::sync::Arc;

/// x and y of every landmark of every hand, in detection then landmark order.
pub fn flatten_pose(hands: &[Hand]) -> Vec<f64> {
    hands
        .iter()
        .flat_map(|hand| hand.landmarks.iter())
        .flat_map(|point| [point.x, point.y])
        .collect()
}

pub fn action_for_label(label: &str) -> Option<Action> {
    match label {
        "0" => Some(Action::Stone),
        "1" => Some(Action::Paper),
        "2" => Some(Action::Scissors),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Play(Action),
    Ignored(String),
}

pub fn dispatch(label: &str) -> Dispatch {
    match action_for_label(label) {
        Some(action) => Dispatch::Play(action),
        None => {
            tracing::warn!("Classifier returned unknown label {:?}, ignoring", label);
            Dispatch::Ignored(label.to_string())
        }
    }
}

#[derive(Clone)]
pub struct GestureBridge {
    classifier: Arc<KnnClassifier>,
    neighbor_count: usize,
}

impl GestureBridge {
    pub fn new(classifier: Arc<KnnClassifier>, neighbor_count: usize) -> Self {
        Self { classifier, neighbor_count }
    }

    pub fn classify_now(&self, hands: &[Hand]) -> GameResult<Classification> {
        let pose = flatten_pose(hands);
        if pose.is_empty() {
            return Err(GameError::EmptyPose);
        }
        tracing::debug!("Classifying pose of {} values from {} hand(s)", pose.len(), hands.len());
        self.classifier.classify(&pose, self.neighbor_count)
    }

    /// Runs the vote on the blocking pool so the caller never stalls on it.
    pub async fn classify(&self, hands: Vec<Hand>) -> GameResult<Classification> {
        let bridge = self.clone();
        tokio::task::spawn_blocking(move || bridge.classify_now(&hands))
            .await
            .map_err(|e| GameError::Classification(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameSession, RoundPolicy, ScorePair};
    use crate::tracking::tests::synthetic_hand;
    use crate::tracking::HAND_LANDMARKS;
    use std::time::{Duration, Instant};

    fn bridge() -> GestureBridge {
        let stone = flatten_pose(&[synthetic_hand(0.0)]);
        let paper: Vec<f64> = stone.iter().enumerate().map(|(i, v)| if i % 2 == 0 { -v } else { *v }).collect();
        let scissors: Vec<f64> = stone.iter().map(|v| -v).collect();
        let classifier = KnnClassifier::from_examples(vec![
            ("0".into(), vec![stone]),
            ("1".into(), vec![paper]),
            ("2".into(), vec![scissors]),
        ])
        .unwrap();
        GestureBridge::new(Arc::new(classifier), 1)
    }

    #[test]
    fn one_hand_flattens_to_twice_its_landmarks() {
        let pose = flatten_pose(&[synthetic_hand(3.0)]);
        assert_eq!(pose.len(), 2 * HAND_LANDMARKS);
        assert_eq!(&pose[..4], &[3.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn two_hands_concatenate_in_order() {
        let first = synthetic_hand(0.0);
        let second = synthetic_hand(100.0);
        let pose = flatten_pose(&[first.clone(), second]);
        assert_eq!(pose.len(), 4 * HAND_LANDMARKS);
        assert_eq!(pose[..2 * HAND_LANDMARKS], flatten_pose(&[first])[..]);
        assert_eq!(pose[2 * HAND_LANDMARKS], 100.0);
    }

    #[test]
    fn labels_map_to_fixed_actions() {
        assert_eq!(dispatch("0"), Dispatch::Play(Action::Stone));
        assert_eq!(dispatch("1"), Dispatch::Play(Action::Paper));
        assert_eq!(dispatch("2"), Dispatch::Play(Action::Scissors));
        assert_eq!(dispatch("3"), Dispatch::Ignored("3".into()));
        assert_eq!(dispatch(""), Dispatch::Ignored(String::new()));
    }

    #[test]
    fn empty_pose_never_reaches_the_classifier() {
        assert!(matches!(bridge().classify_now(&[]), Err(GameError::EmptyPose)));
    }

    #[test]
    fn stone_label_plays_the_stone_round() {
        let result = bridge().classify_now(&[synthetic_hand(0.0)]).unwrap();
        assert_eq!(result.label, "0");

        let mut session = GameSession::new(Duration::from_millis(900), RoundPolicy::Serialize);
        let now = Instant::now();
        match dispatch(&result.label) {
            Dispatch::Play(action) => session.play(action, now).unwrap(),
            Dispatch::Ignored(label) => panic!("label {} ignored", label),
        }
        session.advance_with(now + Duration::from_millis(900), || Action::Paper);
        assert_eq!(session.score(), ScorePair { player: 0, computer: 1 });
        assert_eq!(session.player_hand(), Some(Action::Stone));
    }

    #[tokio::test]
    async fn async_classify_reports_success_and_failure() {
        let bridge = bridge();
        let ok = bridge.classify(vec![synthetic_hand(0.0)]).await.unwrap();
        assert_eq!(ok.label, "0");

        let short = crate::tracking::Hand::new(vec![nalgebra::Vector3::zeros(); 3]);
        let err = bridge.classify(vec![short]).await.unwrap_err();
        assert!(matches!(err, GameError::DimensionMismatch { expected: 42, actual: 6 }));
    }
}
