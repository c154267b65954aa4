//! Edge detection for logical buttons.
//!
//! Inputs are sampled far more often than they change (every pointer move
//! re-asserts every direction), so the detector only reports transitions.
//! The set of held buttons is owned by one control session.

use crate::controller::button_registry::LogicalButton;
use std::collections::BTreeSet;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Press,
    Release,
}

impl Transition {
    pub fn is_press(self) -> bool {
        self == Transition::Press
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEdge {
    pub button: LogicalButton,
    pub transition: Transition,
}

impl ButtonEdge {
    pub fn press(button: LogicalButton) -> Self {
        Self {
            button,
            transition: Transition::Press,
        }
    }

    pub fn release(button: LogicalButton) -> Self {
        Self {
            button,
            transition: Transition::Release,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EdgeDetector {
    active: BTreeSet<LogicalButton>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the desired state of `button` and returns the edge, if any.
    ///
    /// Re-asserting the current state is a no-op, so a button held across a
    /// hundred samples yields exactly one press.
    pub fn set_pressed(&mut self, button: LogicalButton, pressed: bool) -> Option<ButtonEdge> {
        if pressed {
            if self.active.insert(button) {
                trace!("{} down", button);
                return Some(ButtonEdge::press(button));
            }
        } else if self.active.remove(&button) {
            trace!("{} up", button);
            return Some(ButtonEdge::release(button));
        }
        None
    }

    pub fn is_pressed(&self, button: LogicalButton) -> bool {
        self.active.contains(&button)
    }

    pub fn active(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        self.active.iter().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Releases every held button, in button order.
    pub fn release_all(&mut self) -> Vec<ButtonEdge> {
        std::mem::take(&mut self.active)
            .into_iter()
            .map(ButtonEdge::release)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn repeated_presses_emit_once() {
        let mut detector = EdgeDetector::new();
        assert_eq!(
            detector.set_pressed(LogicalButton::A, true),
            Some(ButtonEdge::press(LogicalButton::A))
        );
        for _ in 0..100 {
            assert_eq!(detector.set_pressed(LogicalButton::A, true), None);
        }
        assert_eq!(
            detector.set_pressed(LogicalButton::A, false),
            Some(ButtonEdge::release(LogicalButton::A))
        );
        assert_eq!(detector.set_pressed(LogicalButton::A, false), None);
    }

    #[test]
    fn releasing_an_idle_button_is_silent() {
        let mut detector = EdgeDetector::new();
        assert_eq!(detector.set_pressed(LogicalButton::Start, false), None);
        assert!(detector.is_idle());
    }

    #[test]
    fn release_all_clears_the_set() {
        let mut detector = EdgeDetector::new();
        detector.set_pressed(LogicalButton::Right, true);
        detector.set_pressed(LogicalButton::B, true);

        let edges = detector.release_all();
        assert_eq!(
            edges,
            vec![
                ButtonEdge::release(LogicalButton::Right),
                ButtonEdge::release(LogicalButton::B),
            ]
        );
        assert!(detector.is_idle());
        assert!(detector.release_all().is_empty());
    }

    fn button() -> impl Strategy<Value = LogicalButton> {
        prop::sample::select(LogicalButton::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn edges_alternate_and_balance(samples in prop::collection::vec((button(), any::<bool>()), 0..200)) {
            let mut detector = EdgeDetector::new();
            let mut edges = Vec::new();
            for (button, pressed) in samples {
                edges.extend(detector.set_pressed(button, pressed));
            }
            edges.extend(detector.release_all());

            for button in LogicalButton::ALL {
                let mine: Vec<_> = edges
                    .iter()
                    .filter(|edge| edge.button == button)
                    .map(|edge| edge.transition)
                    .collect();
                prop_assert_eq!(mine.len() % 2, 0);
                for (i, transition) in mine.iter().enumerate() {
                    let expected = if i % 2 == 0 { Transition::Press } else { Transition::Release };
                    prop_assert_eq!(*transition, expected);
                }
            }
        }

        #[test]
        fn membership_tracks_last_edge(samples in prop::collection::vec((button(), any::<bool>()), 0..100)) {
            let mut detector = EdgeDetector::new();
            for (button, pressed) in samples {
                detector.set_pressed(button, pressed);
                prop_assert_eq!(detector.is_pressed(button), pressed);
            }
        }
    }
}
