//! Action-tagged messages exchanged between views and the coordinator.

use crate::bridge::{Issue, TaskEntry};
use crate::timer::TimerState;
use serde::{Deserialize, Serialize};

/// Requests a view sends to the coordinator. Each one receives exactly one `Response`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    StartTimer { issue: Issue },
    StopTimer,
    CancelTimer,
    GetTimerState,
    LogTime { issue: Issue, duration: String },
    SetFavorite { issue: Issue, favorite: bool },
    GetTasks,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::StartTimer { .. } => "startTimer",
            Request::StopTimer => "stopTimer",
            Request::CancelTimer => "cancelTimer",
            Request::GetTimerState => "getTimerState",
            Request::LogTime { .. } => "logTime",
            Request::SetFavorite { .. } => "setFavorite",
            Request::GetTasks => "getTasks",
        }
    }
}

pub const STATUS_STARTED: &str = "Timer started";
pub const STATUS_STOPPED: &str = "Timer stopped";
pub const STATUS_CANCELLED: &str = "Timer cancelled";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    Status { status: String },
    TimerState(TimerState),
    LogResult { success: bool, message: String },
    Tasks { tasks: Vec<TaskEntry> },
}

impl Response {
    pub fn status(text: &str) -> Self {
        Response::Status {
            status: text.to_string(),
        }
    }
}

/// Coordinator-initiated notifications fanned out to attached views.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Push {
    #[serde(rename_all = "camelCase")]
    TimerStateChanged { timer_state: TimerState },
    #[serde(rename_all = "camelCase")]
    ShowMessage { message: String, is_error: bool },
}

impl Push {
    pub fn info(message: impl Into<String>) -> Self {
        Push::ShowMessage {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Push::ShowMessage {
            message: message.into(),
            is_error: true,
        }
    }
}
