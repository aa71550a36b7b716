use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
        })
    }
}

/// User-facing feedback sink (toasts in the viewer, stderr lines in the CLI).
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}

pub type NotifierHandle = Arc<dyn Notifier>;

/// Send to `notifier` when one is attached.
pub(crate) fn emit(notifier: Option<&NotifierHandle>, kind: NotificationKind, message: &str) {
    if let Some(notifier) = notifier {
        notifier.notify(kind, message);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Notifier that remembers everything it was sent.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<(NotificationKind, String)>>,
    }

    impl RecordingNotifier {
        pub fn kinds(&self) -> Vec<NotificationKind> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|(kind, _)| *kind)
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NotificationKind, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((kind, message.to_string()));
        }
    }
}
