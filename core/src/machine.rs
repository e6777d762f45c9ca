use crate::status::StatusUpdate;

/// Output of a pure `step(phase, event)` function.
///
/// The driver applies `status`, then executes `effect` and feeds the resulting
/// event back into the next step.
#[derive(Debug)]
pub struct Transition<P, E> {
    pub phase: P,
    pub effect: E,
    pub status: Option<StatusUpdate>,
}

impl<P, E> Transition<P, E> {
    pub fn to(phase: P, effect: E) -> Self {
        Self {
            phase,
            effect,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusUpdate) -> Self {
        self.status = Some(status);
        self
    }
}
