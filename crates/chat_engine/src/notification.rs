use tokio::sync::mpsc;

/// Fire-and-forget lifecycle signal emitted by the orchestrator for a
/// presentation layer to consume. Delivery is never acknowledged; a dropped
/// receiver silently discards notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
    ProcessingStateChanged { processing: bool },
    Error { message: String },
    Cancelled,
    SettingsUpdated,
}

pub type NotificationSender = mpsc::UnboundedSender<EngineNotification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<EngineNotification>;

/// Creates the notification channel pair.
#[must_use]
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}
