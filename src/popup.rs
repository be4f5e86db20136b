//! View model behind the popup: running timer, recent tasks and favorites.

use crate::bridge::{Issue, TaskEntry};
use crate::format::format_clock;
use crate::messages::{Push, Request};
use crate::timer::TimerState;
use chrono::{DateTime, Local};

pub const IDLE_LABEL: &str = "No timer running";

/// Link to an issue: its own URL, or one built from the GitLab URL, or `#`.
pub fn issue_url(issue: &Issue, gitlab_url: Option<&str>) -> String {
    if let Some(url) = issue.url.as_deref().filter(|url| !url.is_empty()) {
        return url.to_string();
    }
    match gitlab_url {
        Some(base) if !base.is_empty() => format!(
            "{}/-/projects/{}/issues/{}",
            base.trim_end_matches('/'),
            issue.project_id,
            issue.id
        ),
        _ => "#".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerPanel {
    Idle,
    Running {
        title: String,
        reference: String,
        link: String,
        clock: String,
    },
}

impl TimerPanel {
    pub fn from_state(state: &TimerState, now: i64, gitlab_url: Option<&str>) -> Self {
        match (&state.issue, state.is_running) {
            (Some(issue), true) => TimerPanel::Running {
                title: issue.title.clone(),
                reference: format!("(#{})", issue.id),
                link: issue_url(issue, gitlab_url),
                clock: format_clock(state.elapsed_secs(now)),
            },
            _ => TimerPanel::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub issue: Issue,
    pub link: String,
    pub favorite: bool,
    /// Local date of the last tracking session, `YYYY-MM-DD`.
    pub last_tracked: Option<String>,
}

impl TaskRow {
    fn from_entry(entry: &TaskEntry, gitlab_url: Option<&str>) -> Self {
        Self {
            link: issue_url(&entry.issue, gitlab_url),
            favorite: entry.favorite,
            last_tracked: entry.last_tracked.and_then(local_date),
            issue: entry.issue.clone(),
        }
    }

    pub fn start_request(&self) -> Request {
        Request::StartTimer {
            issue: self.issue.clone(),
        }
    }

    /// Clicking the star flips the favorite flag.
    pub fn toggle_favorite_request(&self) -> Request {
        Request::SetFavorite {
            issue: self.issue.clone(),
            favorite: !self.favorite,
        }
    }
}

fn local_date(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d").to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

/// Everything the popup renders.
#[derive(Debug, Clone)]
pub struct PopupView {
    gitlab_url: Option<String>,
    recent_limit: usize,
    state: TimerState,
    tasks: Vec<TaskEntry>,
    notice: Option<Notice>,
}

impl PopupView {
    pub fn new(gitlab_url: Option<String>, recent_limit: usize) -> Self {
        Self {
            gitlab_url,
            recent_limit,
            state: TimerState::default(),
            tasks: Vec::new(),
            notice: None,
        }
    }

    pub fn set_state(&mut self, state: TimerState) {
        self.state = state;
    }

    pub fn set_tasks(&mut self, tasks: Vec<TaskEntry>) {
        self.tasks = tasks;
    }

    pub fn apply(&mut self, push: &Push) {
        match push {
            Push::TimerStateChanged { timer_state } => self.state = timer_state.clone(),
            Push::ShowMessage { message, is_error } => {
                self.notice = Some(Notice {
                    text: message.clone(),
                    is_error: *is_error,
                })
            }
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn timer_panel(&self, now: i64) -> TimerPanel {
        TimerPanel::from_state(&self.state, now, self.gitlab_url.as_deref())
    }

    /// Top of the merged list, favorites included.
    pub fn recent(&self) -> Vec<TaskRow> {
        self.tasks
            .iter()
            .take(self.recent_limit)
            .map(|entry| TaskRow::from_entry(entry, self.gitlab_url.as_deref()))
            .collect()
    }

    pub fn favorites(&self) -> Vec<TaskRow> {
        self.tasks
            .iter()
            .filter(|entry| entry.favorite)
            .map(|entry| TaskRow::from_entry(entry, self.gitlab_url.as_deref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://gitlab.example.com";

    fn entry(id: &str, favorite: bool, last_tracked: Option<i64>) -> TaskEntry {
        TaskEntry {
            issue: Issue::new(format!("Issue {id}"), id, "42"),
            favorite,
            last_tracked,
            last_time_spent: last_tracked.map(|_| 60),
        }
    }

    #[test]
    fn issue_url_prefers_issue_then_base_then_placeholder() {
        let linked =
            Issue::new("A", "1", "42").with_url("https://gitlab.example.com/g/a/-/issues/1");
        assert_eq!(
            issue_url(&linked, Some(BASE)),
            "https://gitlab.example.com/g/a/-/issues/1"
        );

        let bare = Issue::new("B", "2", "42");
        assert_eq!(
            issue_url(&bare, Some("https://gitlab.example.com/")),
            "https://gitlab.example.com/-/projects/42/issues/2"
        );
        assert_eq!(issue_url(&bare, None), "#");
    }

    #[test]
    fn timer_panel_shows_title_reference_and_clock() {
        let state = TimerState {
            is_running: true,
            issue: Some(Issue::new("Fix login", "7", "42")),
            start_time: Some(1_000),
        };
        assert_eq!(
            TimerPanel::from_state(&state, 1_000 + 3_725_000, Some(BASE)),
            TimerPanel::Running {
                title: "Fix login".to_string(),
                reference: "(#7)".to_string(),
                link: "https://gitlab.example.com/-/projects/42/issues/7".to_string(),
                clock: "01:02:05".to_string(),
            }
        );
        assert_eq!(
            TimerPanel::from_state(&TimerState::default(), 0, Some(BASE)),
            TimerPanel::Idle
        );
    }

    #[test]
    fn lists_respect_limit_and_favorite_flag() {
        let mut view = PopupView::new(Some(BASE.to_string()), 2);
        view.set_tasks(vec![
            entry("1", true, None),
            entry("2", false, Some(3_000)),
            entry("3", false, Some(2_000)),
        ]);

        let recent: Vec<String> = view.recent().into_iter().map(|row| row.issue.id).collect();
        assert_eq!(recent, vec!["1", "2"]);

        let favorites = view.favorites();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].last_tracked, None);
        assert_eq!(
            favorites[0].toggle_favorite_request(),
            Request::SetFavorite {
                issue: Issue::new("Issue 1", "1", "42"),
                favorite: false
            }
        );
        assert!(view.recent()[1].last_tracked.is_some());
    }

    #[test]
    fn pushes_update_panel_and_notice() {
        let mut view = PopupView::new(None, 5);
        let issue = Issue::new("Fix login", "7", "42");
        view.apply(&Push::TimerStateChanged {
            timer_state: TimerState {
                is_running: true,
                issue: Some(issue.clone()),
                start_time: Some(0),
            },
        });
        assert!(matches!(
            view.timer_panel(65_000),
            TimerPanel::Running { ref clock, .. } if clock == "01:05"
        ));

        view.apply(&Push::error("quota exceeded"));
        assert_eq!(
            view.notice(),
            Some(&Notice {
                text: "quota exceeded".to_string(),
                is_error: true
            })
        );

        let row = TaskRow::from_entry(&entry("7", false, None), None);
        assert_eq!(row.link, "#");
        assert_eq!(
            row.start_request(),
            Request::StartTimer {
                issue: Issue::new("Issue 7", "7", "42")
            }
        );
    }
}
