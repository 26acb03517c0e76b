use serde::{Deserialize, Serialize};

/// Component lifecycle states, in the order a component moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentStatus {
    NotInitialized,
    ReadyToExecute,
    Active,
    Closed,
    Done,
}

impl ComponentStatus {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: ComponentStatus) -> bool {
        use ComponentStatus::*;

        matches!(
            (self, target),
            // From NotInitialized
            (NotInitialized, ReadyToExecute) |
            (NotInitialized, Closed) |

            // From ReadyToExecute
            (ReadyToExecute, Active) |
            (ReadyToExecute, Closed) |

            // From Active
            (Active, Closed) |

            // Any live state may be killed
            (NotInitialized | ReadyToExecute | Active | Closed, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Done
    }

    /// Get human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::ReadyToExecute => "READY_TO_EXECUTE",
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
            Self::Done => "DONE",
        }
    }
}

impl Default for ComponentStatus {
    fn default() -> Self {
        Self::NotInitialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use ComponentStatus::*;

        assert!(NotInitialized.can_transition_to(ReadyToExecute));
        assert!(ReadyToExecute.can_transition_to(Active));
        assert!(Active.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Done));
        assert!(!Active.can_transition_to(ReadyToExecute));
        assert!(!NotInitialized.can_transition_to(Active));
    }

    #[test]
    fn test_done_is_terminal() {
        use ComponentStatus::*;

        for status in [NotInitialized, ReadyToExecute, Active, Closed] {
            assert!(status.can_transition_to(Done));
            assert!(!Done.can_transition_to(status));
        }
        assert!(!Done.can_transition_to(Done));
        assert!(Done.is_terminal());
    }

    #[test]
    fn test_ordering_follows_lifecycle() {
        assert!(ComponentStatus::Active < ComponentStatus::Closed);
        assert!(ComponentStatus::Closed < ComponentStatus::Done);
        assert_eq!(ComponentStatus::default().name(), "NOT_INITIALIZED");
    }
}
