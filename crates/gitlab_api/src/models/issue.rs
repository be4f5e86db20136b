use serde::Deserialize;

use crate::models::TimeStats;

#[derive(Debug, Deserialize, Clone)]
pub struct Issue {
    pub id: u64,
    /// Project scoped issue number, the one shown in URLs.
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub time_stats: Option<TimeStats>,
}
