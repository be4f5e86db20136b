//! Single owner of the timer state.
//!
//! The coordinator runs as one tokio task. Views talk to it through a
//! `CoordinatorHandle`; every request is handled to completion before the
//! next is read from the mailbox, so state mutation is strictly serialized.
//! Handlers persist after each change and fan the new state out through the
//! `Broadcaster`.

use crate::bridge::{Issue, TaskEntry};
use crate::broadcast::{Broadcaster, RecipientId, RecipientKind};
use crate::credentials::CredentialSource;
use crate::duration::normalize_duration_text;
use crate::format::{format_badge, format_duration, rounded_seconds};
use crate::messages::{
    Push, Request, Response, STATUS_CANCELLED, STATUS_STARTED, STATUS_STOPPED,
};
use crate::storage::{LocalData, LocalStore, StoreLock};
use crate::tasks::{merge_tasks, record_recent, set_favorite};
use crate::timer::{Clock, StoppedTimer, Timer, TimerState};
use gitlab_api::{GitLabClient, GitLabConfig};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const MAILBOX_CAPACITY: usize = 64;
const BADGE_TICK: Duration = Duration::from_secs(1);

pub const MISSING_CONFIG_MESSAGE: &str =
    "GitLab URL or API token is not configured. Open the settings to add them.";
pub const CANCELLED_MESSAGE: &str = "Timer cancelled";
pub const NOTHING_LOGGED_MESSAGE: &str = "Less than a second tracked, nothing was logged";

/// Receives the compact elapsed label while a timer runs, and an empty string when idle.
pub trait BadgeSink: Send + Sync + 'static {
    fn set_badge_text(&self, text: &str);
}

/// Collaborators the coordinator needs at runtime.
pub struct Services {
    pub store: LocalStore,
    pub credentials: Arc<dyn CredentialSource>,
    pub badge: Arc<dyn BadgeSink>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Broadcaster,
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Cloneable entry point to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    mailbox: mpsc::Sender<Envelope>,
    state: watch::Receiver<TimerState>,
    broadcaster: Broadcaster,
}

impl CoordinatorHandle {
    /// Sends a request and waits for its response.
    pub async fn request(&self, request: Request) -> Result<Response, String> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Envelope { request, reply })
            .await
            .map_err(|_| "Timer coordinator is not running".to_string())?;
        response
            .await
            .map_err(|_| "Timer coordinator dropped the request".to_string())
    }

    /// Latest published timer state, read without going through the mailbox.
    pub fn timer_state(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// Attaches a view that should receive pushes.
    pub fn subscribe(&self, kind: RecipientKind) -> (RecipientId, UnboundedReceiver<Push>) {
        self.broadcaster.attach(kind)
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub async fn start_timer(&self, issue: Issue) -> Result<Response, String> {
        self.request(Request::StartTimer { issue }).await
    }

    pub async fn stop_timer(&self) -> Result<Response, String> {
        self.request(Request::StopTimer).await
    }

    pub async fn cancel_timer(&self) -> Result<Response, String> {
        self.request(Request::CancelTimer).await
    }

    pub async fn log_time(
        &self,
        issue: Issue,
        duration: impl Into<String>,
    ) -> Result<Response, String> {
        self.request(Request::LogTime {
            issue,
            duration: duration.into(),
        })
        .await
    }

    pub async fn set_favorite(
        &self,
        issue: Issue,
        favorite: bool,
    ) -> Result<Vec<TaskEntry>, String> {
        expect_tasks(self.request(Request::SetFavorite { issue, favorite }).await?)
    }

    pub async fn tasks(&self) -> Result<Vec<TaskEntry>, String> {
        expect_tasks(self.request(Request::GetTasks).await?)
    }
}

fn expect_tasks(response: Response) -> Result<Vec<TaskEntry>, String> {
    match response {
        Response::Tasks { tasks } => Ok(tasks),
        other => Err(format!("Unexpected response: {other:?}")),
    }
}

/// Claims the store, restores persisted state and starts the coordinator task
/// on the current runtime. The claim lasts until every handle is dropped.
pub fn spawn(services: Services) -> Result<CoordinatorHandle, String> {
    let lock = services.store.lock()?;
    let (coordinator, state) = Coordinator::restore(services, lock);
    let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
    let broadcaster = coordinator.broadcaster.clone();
    tokio::spawn(coordinator.run(inbox));
    Ok(CoordinatorHandle {
        mailbox,
        state,
        broadcaster,
    })
}

struct Coordinator {
    timer: Timer,
    data: LocalData,
    store: LocalStore,
    credentials: Arc<dyn CredentialSource>,
    badge: Arc<dyn BadgeSink>,
    clock: Arc<dyn Clock>,
    broadcaster: Broadcaster,
    state_tx: watch::Sender<TimerState>,
    ticker: Option<JoinHandle<()>>,
    _lock: StoreLock,
}

impl Coordinator {
    fn restore(services: Services, lock: StoreLock) -> (Self, watch::Receiver<TimerState>) {
        let mut data = services.store.load();
        let timer = Timer::restore(std::mem::take(&mut data.timer_state));
        let (state_tx, state_rx) = watch::channel(timer.state().clone());

        let mut coordinator = Self {
            timer,
            data,
            store: services.store,
            credentials: services.credentials,
            badge: services.badge,
            clock: services.clock,
            broadcaster: services.broadcaster,
            state_tx,
            ticker: None,
            _lock: lock,
        };

        if let Some(start) = coordinator.timer.state().start_time {
            let elapsed_whole_secs = (coordinator.clock.now_millis() - start) / 1000;
            if elapsed_whole_secs > 0 {
                info!("Resuming timer running for {}s", elapsed_whole_secs);
                coordinator.refresh_badge();
                coordinator.arm_ticker();
            }
        }

        (coordinator, state_rx)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Envelope>) {
        while let Some(Envelope { request, reply }) = inbox.recv().await {
            debug!("Handling {}", request.action());
            let response = self.handle(request).await;
            if reply.send(response).is_err() {
                debug!("Requester went away before the response");
            }
        }
        self.stop_ticker();
        debug!("Timer coordinator stopped");
    }

    async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::StartTimer { issue } => self.start_timer(issue).await,
            Request::StopTimer => {
                if self.timer.is_running() {
                    self.stop_and_log().await;
                }
                Response::status(STATUS_STOPPED)
            }
            Request::CancelTimer => self.cancel_timer(),
            Request::GetTimerState => Response::TimerState(self.timer.state().clone()),
            Request::LogTime { issue, duration } => self.log_time(&issue, &duration).await,
            Request::SetFavorite { issue, favorite } => {
                if set_favorite(&mut self.data.favorites, &issue, favorite) {
                    self.persist();
                }
                self.tasks()
            }
            Request::GetTasks => self.tasks(),
        }
    }

    async fn start_timer(&mut self, issue: Issue) -> Response {
        if self.timer.is_running() {
            self.stop_and_log().await;
        }

        let now = self.clock.now_millis();
        info!("Starting timer for #{} in project {}", issue.id, issue.project_id);
        self.timer.start(issue.clone(), now);
        record_recent(&mut self.data.recent_tasks, &issue, now, 0);
        self.persist();
        self.arm_ticker();
        self.publish_state();
        Response::status(STATUS_STARTED)
    }

    /// Takes the running timer off the clock and submits its time. The cleared
    /// state is never rolled back, whatever the submission outcome.
    async fn stop_and_log(&mut self) {
        let now = self.clock.now_millis();
        let Some(StoppedTimer { issue, elapsed }) = self.timer.stop(now) else {
            return;
        };
        self.stop_ticker();
        record_recent(&mut self.data.recent_tasks, &issue, now, elapsed);
        self.persist();
        self.publish_state();

        info!("Stopped timer for #{} after {}s", issue.id, elapsed);
        if elapsed == 0 {
            self.notify(Push::info(NOTHING_LOGGED_MESSAGE));
            return;
        }

        let duration = format_duration(elapsed);
        let push = match self.submit(&issue, &duration).await {
            Ok(()) => Push::info(format!("Logged {} to #{}", duration, issue.id)),
            Err(message) => Push::error(message),
        };
        self.notify(push);
    }

    fn cancel_timer(&mut self) -> Response {
        if let Some(issue) = self.timer.cancel() {
            info!("Cancelled timer for #{}", issue.id);
            self.stop_ticker();
            self.persist();
            self.publish_state();
            self.notify(Push::info(CANCELLED_MESSAGE));
        }
        Response::status(STATUS_CANCELLED)
    }

    async fn log_time(&mut self, issue: &Issue, duration: &str) -> Response {
        let duration = match normalize_duration_text(duration) {
            Ok(value) => value,
            Err(message) => {
                return Response::LogResult {
                    success: false,
                    message,
                }
            }
        };

        match self.submit(issue, &duration).await {
            Ok(()) => Response::LogResult {
                success: true,
                message: format!("Logged {} to #{}", duration, issue.id),
            },
            Err(message) => Response::LogResult {
                success: false,
                message,
            },
        }
    }

    /// Posts `duration` to the issue. Errors come back as user-facing text.
    async fn submit(&self, issue: &Issue, duration: &str) -> Result<(), String> {
        let Some(credentials) = self.credentials.credentials() else {
            warn!("Skipping submission for #{}: GitLab is not configured", issue.id);
            return Err(MISSING_CONFIG_MESSAGE.to_string());
        };

        let config = GitLabConfig::new(credentials.gitlab_url, credentials.api_token);
        let client = GitLabClient::new(config).map_err(|err| err.user_message())?;
        match client
            .add_spent_time(&issue.project_id, &issue.id, duration)
            .await
        {
            Ok(stats) => {
                debug!(
                    "Issue #{} now has {}s spent",
                    issue.id, stats.total_time_spent
                );
                Ok(())
            }
            Err(err) => {
                warn!("Failed to log time for #{}: {}", issue.id, err);
                Err(err.user_message())
            }
        }
    }

    fn tasks(&self) -> Response {
        Response::Tasks {
            tasks: merge_tasks(&self.data.recent_tasks, &self.data.favorites),
        }
    }

    fn persist(&mut self) {
        self.data.timer_state = self.timer.state().clone();
        if let Err(err) = self.store.save(&self.data) {
            warn!("Failed to persist timer state: {}", err);
        }
    }

    fn publish_state(&self) {
        let state = self.timer.state().clone();
        self.state_tx.send_replace(state.clone());
        self.notify(Push::TimerStateChanged { timer_state: state });
        self.refresh_badge();
    }

    fn notify(&self, push: Push) {
        let gitlab_url = self.credentials.gitlab_url();
        let delivered = self.broadcaster.broadcast(&push, gitlab_url.as_deref());
        debug!("Push delivered to {} recipient(s)", delivered);
    }

    fn refresh_badge(&self) {
        let text = if self.timer.is_running() {
            format_badge(self.timer.state().elapsed_secs(self.clock.now_millis()))
        } else {
            String::new()
        };
        self.badge.set_badge_text(&text);
    }

    fn arm_ticker(&mut self) {
        self.stop_ticker();
        let Some(start) = self.timer.state().start_time else {
            return;
        };
        let badge = Arc::clone(&self.badge);
        let clock = Arc::clone(&self.clock);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(BADGE_TICK);
            loop {
                interval.tick().await;
                let elapsed = rounded_seconds(clock.now_millis() - start);
                badge.set_badge_text(&format_badge(elapsed));
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
