//! Locally available reassurance used while the backend is unreachable.

/// Banner shown whenever the session drops to offline mode.
pub const OFFLINE_MESSAGE: &str =
    "You're offline, but everything you need is right here. Keep going with the exercise.";

/// Replies to user messages sent while offline, in the order they are used.
pub const FALLBACK_MESSAGES: &[&str] = &[
    "I'm still here with you. Try taking a slow, deep breath in, and let it out slowly.",
    "You're safe. This feeling is uncomfortable, but it will pass.",
    "Notice your feet on the ground. You are here, right now.",
    "You're doing well. Stay with the exercise a little longer.",
    "Panic peaks and then fades. Let this wave move through you.",
];

/// Deterministic cursor over [`FALLBACK_MESSAGES`].
#[derive(Debug, Clone, Default)]
pub struct FallbackCycle {
    index: usize,
}

impl FallbackCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current message; advances by one and wraps.
    pub fn next_message(&mut self) -> &'static str {
        let message = FALLBACK_MESSAGES[self.index % FALLBACK_MESSAGES.len()];
        self.index = (self.index + 1) % FALLBACK_MESSAGES.len();
        message
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_in_order_and_wraps() {
        let mut cycle = FallbackCycle::new();
        let first_pass: Vec<_> = (0..FALLBACK_MESSAGES.len())
            .map(|_| cycle.next_message())
            .collect();
        assert_eq!(first_pass, FALLBACK_MESSAGES.to_vec());
        assert_eq!(cycle.next_message(), FALLBACK_MESSAGES[0]);
    }

    #[test]
    fn test_consecutive_messages_differ() {
        let mut cycle = FallbackCycle::new();
        let a = cycle.next_message();
        let b = cycle.next_message();
        assert_ne!(a, b);
    }
}
