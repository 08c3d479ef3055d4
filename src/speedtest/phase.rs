//! Run phases and the one function allowed to move between them.
//!
//! A run goes `Idle → Download → Upload → Ping → Complete` and nowhere
//! else, except that `Abort` returns any phase straight to `Idle`.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Download,
    Upload,
    Ping,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Begin a new run.
    Start,
    /// The current phase finished its work.
    Finished,
    /// Cancelled by the caller or failed at run level.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot apply {:?} while in {:?}", self.event, self.from)
    }
}

impl std::error::Error for InvalidTransition {}

impl Phase {
    pub fn next(self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        use Phase::*;
        use PhaseEvent::*;

        match (self, event) {
            (_, Abort) => Ok(Idle),
            (Idle | Complete, Start) => Ok(Download),
            (Download, Finished) => Ok(Upload),
            (Upload, Finished) => Ok(Ping),
            (Ping, Finished) => Ok(Complete),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    /// True while a run is in flight.
    pub fn is_testing(self) -> bool {
        matches!(self, Phase::Download | Phase::Upload | Phase::Ping)
    }

    /// Slice of the unified progress bar this phase owns, in percent.
    pub fn progress_span(self) -> (f64, f64) {
        match self {
            Phase::Idle => (0.0, 0.0),
            Phase::Download => (0.0, 60.0),
            Phase::Upload => (60.0, 80.0),
            Phase::Ping => (80.0, 100.0),
            Phase::Complete => (100.0, 100.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Ready to test",
            Phase::Download => "Testing download...",
            Phase::Upload => "Testing upload...",
            Phase::Ping => "Testing latency...",
            Phase::Complete => "Test complete!",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Download => "download",
            Phase::Upload => "upload",
            Phase::Ping => "ping",
            Phase::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forward_pass() {
        let mut phase = Phase::Idle;
        let mut seen = vec![phase];

        phase = phase.next(PhaseEvent::Start).unwrap();
        seen.push(phase);
        while phase != Phase::Complete {
            phase = phase.next(PhaseEvent::Finished).unwrap();
            seen.push(phase);
        }

        assert_eq!(
            seen,
            vec![
                Phase::Idle,
                Phase::Download,
                Phase::Upload,
                Phase::Ping,
                Phase::Complete
            ]
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        assert!(Phase::Idle.next(PhaseEvent::Finished).is_err());
        assert!(Phase::Complete.next(PhaseEvent::Finished).is_err());
        assert!(Phase::Download.next(PhaseEvent::Start).is_err());
        assert!(Phase::Ping.next(PhaseEvent::Start).is_err());

        let err = Phase::Upload.next(PhaseEvent::Start).unwrap_err();
        assert_eq!(err.from, Phase::Upload);
        assert!(err.to_string().contains("Upload"));
    }

    #[test]
    fn test_restart_after_complete() {
        assert_eq!(
            Phase::Complete.next(PhaseEvent::Start).unwrap(),
            Phase::Download
        );
    }

    #[test]
    fn test_progress_spans_tile_the_bar() {
        assert_eq!(Phase::Download.progress_span(), (0.0, 60.0));
        assert_eq!(Phase::Upload.progress_span(), (60.0, 80.0));
        assert_eq!(Phase::Ping.progress_span(), (80.0, 100.0));
    }

    fn any_phase() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Phase::Idle),
            Just(Phase::Download),
            Just(Phase::Upload),
            Just(Phase::Ping),
            Just(Phase::Complete),
        ]
    }

    fn any_event() -> impl Strategy<Value = PhaseEvent> {
        prop_oneof![
            Just(PhaseEvent::Start),
            Just(PhaseEvent::Finished),
            Just(PhaseEvent::Abort),
        ]
    }

    fn rank(phase: Phase) -> u8 {
        match phase {
            Phase::Idle => 0,
            Phase::Download => 1,
            Phase::Upload => 2,
            Phase::Ping => 3,
            Phase::Complete => 4,
        }
    }

    proptest! {
        #[test]
        fn abort_always_returns_to_idle(phase in any_phase()) {
            prop_assert_eq!(phase.next(PhaseEvent::Abort), Ok(Phase::Idle));
        }

        /// Any accepted non-abort transition moves exactly one step forward,
        /// or restarts a finished/idle run at download.
        #[test]
        fn accepted_transitions_never_skip(
            events in proptest::collection::vec(any_event(), 0..40)
        ) {
            let mut phase = Phase::Idle;
            for event in events {
                if let Ok(next) = phase.next(event) {
                    match event {
                        PhaseEvent::Abort => prop_assert_eq!(next, Phase::Idle),
                        PhaseEvent::Start => {
                            prop_assert!(!phase.is_testing());
                            prop_assert_eq!(next, Phase::Download);
                        }
                        PhaseEvent::Finished => {
                            prop_assert_eq!(rank(next), rank(phase) + 1);
                        }
                    }
                    phase = next;
                }
            }
        }
    }
}
