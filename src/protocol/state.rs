use std::fmt;

/// Server-side control state of one connection.
///
/// `Idle` has no transport socket; `Active` owns exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    #[default]
    Idle,
    Active,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Idle => f.write_str("idle"),
            ControlState::Active => f.write_str("active"),
        }
    }
}
