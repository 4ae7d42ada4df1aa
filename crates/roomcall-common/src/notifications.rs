/// Severity level for user-facing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A status notice for the UI (status line, toast, alert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
}

impl Notification {
    fn new(level: NotificationLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_level() {
        assert_eq!(Notification::info("a", "b").level, NotificationLevel::Info);
        assert_eq!(
            Notification::warning("a", "b").level,
            NotificationLevel::Warning
        );
        assert_eq!(Notification::error("a", "b").level, NotificationLevel::Error);
    }

    #[test]
    fn constructors_keep_text() {
        let n = Notification::warning("Camera", "joining audio-only");
        assert_eq!(n.title, "Camera");
        assert_eq!(n.body, "joining audio-only");
    }
}
