//! Transient user-visible notices.

use std::collections::VecDeque;
use std::time::Duration;

use web_time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    /// Diagnostic log attached for bug reports.
    pub log: Option<String>,
    pub expires_at: Instant,
}

/// Notices shown until they expire or are dismissed.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    notices: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, now: Instant, duration: Duration, message: impl Into<String>, log: Option<String>) -> &Notice {
        let notice = Notice {
            message: message.into(),
            log,
            expires_at: now + duration,
        };
        tracing::info!(target: "tategaki::view", message = %notice.message, "notice");
        self.notices.push_back(notice);
        &self.notices[self.notices.len() - 1]
    }

    /// Drop expired notices and return the ones still showing.
    pub fn active(&mut self, now: Instant) -> impl Iterator<Item = &Notice> {
        self.notices.retain(|n| n.expires_at > now);
        self.notices.iter()
    }

    pub fn dismiss_all(&mut self) {
        self.notices.clear();
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_expire() {
        let mut queue = NoticeQueue::default();
        let t0 = Instant::now();
        queue.push(t0, Duration::from_secs(4), "入力方式を切り替えました", None);
        assert_eq!(queue.active(t0 + Duration::from_secs(1)).count(), 1);
        assert_eq!(queue.active(t0 + Duration::from_secs(5)).count(), 0);
        assert!(queue.is_empty());
    }
}
