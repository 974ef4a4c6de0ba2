use crate::models::notification::NotificationEvent;

/// Fire-and-forget hand-off to the notification service. The engine only
/// guarantees a well-formed event per state change; delivery and retry are
/// the collaborator's concern.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: NotificationEvent);
}

/// Logs events instead of delivering them. Stands in until the real
/// push/email/SMS pipeline is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, event: NotificationEvent) {
        tracing::info!(
            request_id = %event.request_id,
            club = %event.club,
            kind = ?event.kind,
            recipients = event.recipients.len(),
            "notification event"
        );
    }
}

#[cfg(test)]
pub struct RecordingNotifier {
    events: std::sync::Mutex<Vec<NotificationEvent>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn publish(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
