//! State machine trait for status enums.

use super::ValidationError;

/// Status enums whose values move along a fixed transition table.
///
/// Re-applying the current status is a legal no-op for every implementor;
/// `can_transition_to` only has to describe real moves.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if moving from self to a different target is allowed.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all distinct states reachable in one step.
    fn valid_transitions(&self) -> Vec<Self>;

    /// True when `target` is reachable or equal to the current state.
    fn accepts(&self, target: &Self) -> bool {
        self == target || self.can_transition_to(target)
    }

    /// Performs the transition, returning an error if the table forbids it.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.accepts(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
        Closed,
        Locked,
        Removed,
    }

    impl StateMachine for Door {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Door::*;
            matches!(
                (self, target),
                (Open, Closed) | (Closed, Open) | (Closed, Locked) | (Locked, Closed) | (_, Removed)
            ) && self != &Removed
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Door::*;
            match self {
                Open => vec![Closed, Removed],
                Closed => vec![Open, Locked, Removed],
                Locked => vec![Closed, Removed],
                Removed => vec![],
            }
        }
    }

    #[test]
    fn self_transition_is_always_accepted() {
        for door in [Door::Open, Door::Closed, Door::Locked, Door::Removed] {
            assert_eq!(door.transition_to(door), Ok(door));
        }
    }

    #[test]
    fn forbidden_transition_is_rejected() {
        assert!(Door::Open.transition_to(Door::Locked).is_err());
        assert!(Door::Removed.transition_to(Door::Open).is_err());
    }

    #[test]
    fn terminal_state_has_no_outgoing_moves() {
        assert!(Door::Removed.is_terminal());
        assert!(!Door::Locked.is_terminal());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for door in [Door::Open, Door::Closed, Door::Locked, Door::Removed] {
            for target in door.valid_transitions() {
                assert!(door.can_transition_to(&target), "{:?} -> {:?}", door, target);
            }
        }
    }
}
