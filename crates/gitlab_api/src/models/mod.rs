mod issue;
mod time_stats;
mod user;

pub use issue::Issue;
pub use time_stats::TimeStats;
pub use user::User;
