// Represents the current state of the cycle scheduler
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum State {
    #[default]
    Idle,    // No cycle running, nothing scheduled
    Running, // Ticking through the playlist
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "idle"),
            State::Running => write!(f, "running"),
        }
    }
}

/// Result of asking the scheduler to start.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    EmptyPlaylist,
}
