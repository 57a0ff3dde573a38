//! Outbound message throttling.
//!
//! A message identical to the previous one inside the dedup window is
//! dropped. At most `max_per_minute` messages leave in any rolling minute.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of offering a message to the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Send,
    Duplicate,
    RateLimited,
}

#[derive(Debug)]
pub struct MessageThrottle {
    dedup_window: Duration,
    max_per_minute: usize,
    last: Option<(String, Instant)>,
    sent: VecDeque<Instant>,
}

impl MessageThrottle {
    #[must_use]
    pub fn new(dedup_window: Duration, max_per_minute: usize) -> Self {
        Self {
            dedup_window,
            max_per_minute,
            last: None,
            sent: VecDeque::with_capacity(max_per_minute),
        }
    }

    /// Decide whether `text` may be sent at `now`, recording it if so.
    pub fn admit(&mut self, text: &str, now: Instant) -> Admission {
        if let Some((previous, at)) = &self.last {
            if previous == text && now.saturating_duration_since(*at) < self.dedup_window {
                return Admission::Duplicate;
            }
        }

        while let Some(front) = self.sent.front() {
            if now.saturating_duration_since(*front) >= RATE_WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }
        if self.sent.len() >= self.max_per_minute {
            return Admission::RateLimited;
        }

        self.sent.push_back(now);
        self.last = Some((text.to_string(), now));
        Admission::Send
    }
}
