use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

/// Pending notifications, shown once on the next rendered page.
#[derive(Default)]
pub struct ToastService {
    pending: Mutex<Vec<Toast>>,
}

impl ToastService {
    pub fn push(&self, kind: ToastKind, message: impl Into<String>) {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.push(Toast {
            kind,
            message: message.into(),
        });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(ToastKind::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ToastKind::Error, message);
    }

    pub fn drain(&self) -> Vec<Toast> {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let toasts = ToastService::default();
        toasts.success("saved");
        toasts.error("failed");
        let drained = toasts.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].kind, ToastKind::Error);
        assert!(toasts.drain().is_empty());
    }
}
