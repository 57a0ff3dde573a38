use std::sync::{Arc, Mutex};

use sensexbot::port::outbound::notifier::{Event, Notifier, NotifierRegistry};

/// Thread-safe event collector for notification assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose only notifier is a clone of `self`.
    pub fn registry(&self) -> Arc<NotifierRegistry> {
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(self.clone()));
        Arc::new(registry)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("lock notifier events").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("lock notifier events").len()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: Event) {
        self.events
            .lock()
            .expect("lock notifier events")
            .push(event);
    }
}
