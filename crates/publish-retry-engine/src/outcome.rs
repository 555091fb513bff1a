/// Result of one full retry cycle for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Succeeded,
    /// Stopped on a permanent error; carries the recorded reason.
    PermanentlyDenied(String),
    /// Attempt budget spent; carries the last error.
    ExhaustedRetries(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Succeeded => "succeeded",
            DeliveryOutcome::PermanentlyDenied(_) => "permanently_denied",
            DeliveryOutcome::ExhaustedRetries(_) => "exhausted_retries",
        }
    }
}
