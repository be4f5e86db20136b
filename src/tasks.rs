//! Recent-task history, favorites and the merged list the popup renders.

use crate::bridge::{Issue, RecentTask, TaskEntry};
use std::cmp::Reverse;

/// Maximum number of entries kept in the recent-task history.
pub const MAX_RECENT_TASKS: usize = 10;

/// Records `issue` at the front of `recent`, dropping older entries for the same issue
/// and anything past the cap.
pub fn record_recent(
    recent: &mut Vec<RecentTask>,
    issue: &Issue,
    tracked_at: i64,
    time_spent: u64,
) {
    recent.retain(|task| !task.issue.same_issue(issue));
    recent.insert(
        0,
        RecentTask {
            issue: issue.clone(),
            last_tracked: tracked_at,
            last_time_spent: time_spent,
        },
    );
    recent.truncate(MAX_RECENT_TASKS);
}

/// Adds or removes a favorite. Returns whether the list changed.
pub fn set_favorite(favorites: &mut Vec<Issue>, issue: &Issue, favorite: bool) -> bool {
    let exists = favorites.iter().any(|item| item.same_issue(issue));
    match (favorite, exists) {
        (true, false) => {
            favorites.insert(0, issue.clone());
            true
        }
        (false, true) => {
            favorites.retain(|item| !item.same_issue(issue));
            true
        }
        _ => false,
    }
}

/// Merges history and favorites into one list.
///
/// Favorites come first, then the remaining recents; each group is ordered by
/// `last_tracked` descending with untracked favorites last. An issue present in
/// both lists appears once, as a favorite carrying the recent timestamps.
pub fn merge_tasks(recent: &[RecentTask], favorites: &[Issue]) -> Vec<TaskEntry> {
    let mut entries: Vec<TaskEntry> = Vec::with_capacity(recent.len() + favorites.len());

    for favorite in favorites {
        if entries.iter().any(|entry| entry.issue.same_issue(favorite)) {
            continue;
        }
        let tracked = recent.iter().find(|task| task.issue.same_issue(favorite));
        entries.push(TaskEntry {
            issue: tracked.map(|task| task.issue.clone()).unwrap_or_else(|| favorite.clone()),
            favorite: true,
            last_tracked: tracked.map(|task| task.last_tracked),
            last_time_spent: tracked.map(|task| task.last_time_spent),
        });
    }

    for task in recent {
        if entries.iter().any(|entry| entry.issue.same_issue(&task.issue)) {
            continue;
        }
        entries.push(TaskEntry {
            issue: task.issue.clone(),
            favorite: false,
            last_tracked: Some(task.last_tracked),
            last_time_spent: Some(task.last_time_spent),
        });
    }

    // Stable sort keeps insertion order for equal keys.
    entries.sort_by_key(|entry| (Reverse(entry.favorite), Reverse(entry.last_tracked)));
    entries
}
