use serde::Deserialize;

/// Time tracking totals GitLab returns from the spent-time endpoints and embeds in issues.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TimeStats {
    #[serde(default)]
    pub time_estimate: u64,
    #[serde(default)]
    pub total_time_spent: u64,
    #[serde(default)]
    pub human_time_estimate: Option<String>,
    #[serde(default)]
    pub human_total_time_spent: Option<String>,
}
