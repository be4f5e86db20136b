//! Issue page detection and the start/stop control shown on it.
//!
//! Reading the page itself is somebody else's job: a `PageScraper` hands
//! over the few facts detection needs, and everything here works on those.

use crate::bridge::Issue;
use crate::messages::{Push, Request};
use crate::timer::TimerState;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// `data-page` value GitLab sets on issue detail pages.
pub const ISSUE_PAGE_KIND: &str = "projects:issues:show";

static ISSUE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"issues/(\d+)").expect("invalid issue id regex"));

/// Facts read from the host page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFacts {
    /// `data-page` attribute of the body, when present.
    pub page_kind: Option<String>,
    /// Whether the breadcrumbs link to an issue list.
    pub has_issues_breadcrumb: bool,
    pub pathname: String,
    pub href: String,
    /// Text of the issue title element.
    pub title: Option<String>,
    /// `data-project-id` attribute of the body, or a project path.
    pub project_id: Option<String>,
}

/// Capability to read `PageFacts` from whatever page is showing.
pub trait PageScraper {
    fn page_facts(&self) -> Option<PageFacts>;
}

/// Issue number in a path such as `/group/app/-/issues/7`.
pub fn issue_id_from_path(pathname: &str) -> Option<String> {
    ISSUE_ID_REGEX
        .captures(pathname)
        .map(|captures| captures[1].to_string())
}

/// Builds the issue shown by the page, or `None` when this is not a usable issue page.
pub fn detect_issue(facts: &PageFacts) -> Option<Issue> {
    let is_issue_page = facts.page_kind.as_deref() == Some(ISSUE_PAGE_KIND)
        || facts.has_issues_breadcrumb
        || facts.pathname.contains("/issues/");
    if !is_issue_page {
        return None;
    }

    let id = issue_id_from_path(&facts.pathname)?;
    let title = facts
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())?;
    let project_id = facts
        .project_id
        .as_deref()
        .map(str::trim)
        .filter(|project| !project.is_empty())?;

    let mut issue = Issue::new(title, id, project_id);
    if !facts.href.is_empty() {
        issue = issue.with_url(facts.href.clone());
    }
    Some(issue)
}

/// Scraper over a bare issue URL such as `https://gitlab.example.com/group/app/-/issues/7`.
///
/// The project path stands in for the numeric project id; the API accepts both.
pub struct IssueUrlScraper {
    url: String,
    title: Option<String>,
}

impl IssueUrlScraper {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }
}

impl PageScraper for IssueUrlScraper {
    fn page_facts(&self) -> Option<PageFacts> {
        let parsed = Url::parse(self.url.trim()).ok()?;
        let pathname = parsed.path().to_string();
        let project_path = pathname
            .split_once("/-/issues/")
            .or_else(|| pathname.split_once("/issues/"))
            .map(|(project, _)| project.trim_matches('/').to_string())
            .filter(|project| !project.is_empty());

        Some(PageFacts {
            page_kind: None,
            has_issues_breadcrumb: false,
            href: parsed.to_string(),
            title: self.title.clone(),
            project_id: project_path,
            pathname,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMessage {
    pub text: String,
    pub is_error: bool,
}

/// The control injected next to the issue title.
#[derive(Debug, Clone)]
pub struct IssueControl {
    issue: Issue,
    mode: ControlMode,
    message: Option<InlineMessage>,
}

impl IssueControl {
    /// Creates the control when the page shows an issue. Detection failures are silent.
    pub fn inject(scraper: &dyn PageScraper, current: &TimerState) -> Option<Self> {
        let issue = detect_issue(&scraper.page_facts()?)?;
        let mut control = Self {
            issue,
            mode: ControlMode::Start,
            message: None,
        };
        control.reflect(current);
        Some(control)
    }

    pub fn issue(&self) -> &Issue {
        &self.issue
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn tooltip(&self) -> &'static str {
        match self.mode {
            ControlMode::Start => "Start Timer",
            ControlMode::Stop => "Stop & Log Time",
        }
    }

    /// The cancel affordance only exists while this page's issue is being tracked.
    pub fn shows_cancel(&self) -> bool {
        self.mode == ControlMode::Stop
    }

    pub fn message(&self) -> Option<&InlineMessage> {
        self.message.as_ref()
    }

    /// Request to send when the main button is clicked.
    pub fn click(&self) -> Request {
        match self.mode {
            ControlMode::Start => Request::StartTimer {
                issue: self.issue.clone(),
            },
            ControlMode::Stop => Request::StopTimer,
        }
    }

    pub fn click_cancel(&self) -> Option<Request> {
        self.shows_cancel().then_some(Request::CancelTimer)
    }

    /// Flips the button once the coordinator acknowledged `sent`.
    pub fn acknowledge(&mut self, sent: &Request) {
        match sent {
            Request::StartTimer { issue } if issue.id == self.issue.id => {
                self.mode = ControlMode::Stop
            }
            Request::StopTimer | Request::CancelTimer => self.mode = ControlMode::Start,
            _ => {}
        }
    }

    pub fn on_push(&mut self, push: &Push) {
        match push {
            Push::TimerStateChanged { timer_state } => self.reflect(timer_state),
            Push::ShowMessage { message, is_error } => {
                self.message = Some(InlineMessage {
                    text: message.clone(),
                    is_error: *is_error,
                })
            }
        }
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    /// Pages only know the issue id reliably, so that is what gets compared.
    fn reflect(&mut self, state: &TimerState) {
        let tracking_this_issue = state.is_running
            && state
                .issue
                .as_ref()
                .is_some_and(|running| running.id == self.issue.id);
        self.mode = if tracking_this_issue {
            ControlMode::Stop
        } else {
            ControlMode::Start
        };
    }
}
