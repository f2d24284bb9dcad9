use serde::Serialize;

pub const PLAYBACK_ERROR_TITLE: &str = "Video Playback Error";
pub const ANALYSIS_FAILED_TITLE: &str = "AI Analysis Failed";

/// A dismissable, user-visible failure message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct NoticeQueue {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeQueue {
    /// Show a notice. An open notice with the same title is replaced, so
    /// repeated failures leave one notice per title.
    pub fn push(&mut self, title: &str, description: impl Into<String>) -> u64 {
        self.notices.retain(|n| n.title != title);
        self.next_id += 1;
        self.notices.push(Notice {
            id: self.next_id,
            title: title.to_string(),
            description: description.into(),
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn as_slice(&self) -> &[Notice] {
        &self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut queue = NoticeQueue::default();
        let a = queue.push(PLAYBACK_ERROR_TITLE, "network");
        let b = queue.push(ANALYSIS_FAILED_TITLE, String::from("API Error (500): boom"));
        assert_ne!(a, b);
        assert_eq!(queue.as_slice().len(), 2);

        assert!(queue.dismiss(a));
        assert!(!queue.dismiss(a));
        assert_eq!(queue.as_slice()[0].title, ANALYSIS_FAILED_TITLE);
    }

    #[test]
    fn test_repeated_title_replaces_open_notice() {
        let mut queue = NoticeQueue::default();
        queue.push(PLAYBACK_ERROR_TITLE, "network");
        let first = queue.push(ANALYSIS_FAILED_TITLE, "API Error (500): boom");
        for _ in 0..50 {
            queue.push(ANALYSIS_FAILED_TITLE, "API Error (500): boom");
        }
        let last = queue.push(ANALYSIS_FAILED_TITLE, "API Error (502): Bad Gateway");

        let notices = queue.as_slice();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].title, PLAYBACK_ERROR_TITLE);
        assert_eq!(notices[1].id, last);
        assert_eq!(notices[1].description, "API Error (502): Bad Gateway");
        assert!(!queue.dismiss(first));
    }
}
