//! View-facing DTOs shared by the coordinator, the popup and the page injector.
//!
//! Field names serialize in camelCase so persisted documents and pushed
//! messages keep the `projectId` / `lastTracked` shapes views expect.

use serde::{Deserialize, Serialize};

/// A GitLab issue as seen from a page or a task list. Identity is `(project_id, id)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub title: String,
    /// Project scoped issue number taken from the issue URL.
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Issue {
    pub fn new(
        title: impl Into<String>,
        id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            id: id.into(),
            project_id: project_id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn key(&self) -> IssueKey<'_> {
        IssueKey {
            project_id: &self.project_id,
            id: &self.id,
        }
    }

    pub fn same_issue(&self, other: &Issue) -> bool {
        self.key() == other.key()
    }
}

/// Borrowed identity key of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IssueKey<'a> {
    pub project_id: &'a str,
    pub id: &'a str,
}

/// Entry of the bounded recent-task history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecentTask {
    #[serde(flatten)]
    pub issue: Issue,
    /// Unix milliseconds of the last start or stop.
    pub last_tracked: i64,
    /// Seconds logged by the last stop, zero when only started.
    pub last_time_spent: u64,
}

/// Row of the merged recent/favorite list rendered by the popup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskEntry {
    #[serde(flatten)]
    pub issue: Issue,
    pub favorite: bool,
    #[serde(default)]
    pub last_tracked: Option<i64>,
    #[serde(default)]
    pub last_time_spent: Option<u64>,
}
