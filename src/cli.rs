use crate::bridge::Issue;
use crate::broadcast::{Broadcaster, RecipientKind};
use crate::config::{normalize_gitlab_url, ConfigManager};
use crate::coordinator::{self, BadgeSink, CoordinatorHandle, Services};
use crate::credentials::{CredentialSource, StoredCredentials};
use crate::messages::{Push, Response};
use crate::page::{detect_issue, issue_id_from_path, IssueUrlScraper, PageFacts, PageScraper};
use crate::popup::{PopupView, TaskRow, TimerPanel, IDLE_LABEL};
use crate::secrets::{mask_token, SecretsManager};
use crate::storage::LocalStore;
use crate::timer::{Clock, SystemClock};
use clap::{Args, Parser, Subcommand};
use gitlab_api::{GitLabClient, GitLabConfig};
use log::{debug, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "gitlab-timer")]
#[command(about = "Track time on GitLab issues and log it when the timer stops")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking an issue, logging the running timer first
    Start(IssueArgs),
    /// Stop the running timer and log its time
    Stop,
    /// Discard the running timer without logging anything
    Cancel,
    /// Show the running timer, recent tasks and favorites
    Status,
    /// List every recent and favorite task
    Tasks,
    /// Log a duration such as "1h 30m" to an issue
    Log {
        #[command(flatten)]
        issue: IssueArgs,
        /// GitLab duration text, e.g. 1h 30m, 2d or 45m
        #[arg(num_args = 1.., required = true)]
        duration: Vec<String>,
    },
    /// Mark an issue as favorite
    Favorite {
        #[command(flatten)]
        issue: IssueArgs,
        /// Remove the favorite mark instead
        #[arg(long)]
        remove: bool,
    },
    /// Stay attached: show the badge in the terminal title and read commands from stdin
    Watch,
    /// Manage the GitLab URL and API token
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct IssueArgs {
    /// Issue URL, e.g. https://gitlab.example.com/group/app/-/issues/7
    #[arg(long, conflicts_with_all = ["project", "issue"])]
    pub url: Option<String>,
    /// Project id or full path
    #[arg(long, requires = "issue")]
    pub project: Option<String>,
    /// Issue number within the project
    #[arg(long, requires = "project")]
    pub issue: Option<String>,
    /// Title to show; fetched from GitLab when omitted
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Set the GitLab instance URL
    SetUrl { url: String },
    /// Store the API token in the system keyring
    SetToken { token: String },
    /// Remove the API token from the system keyring
    ClearToken,
    /// Number of tasks shown in the recent list
    SetRecentLimit { limit: usize },
    /// Verify the URL and token against GitLab
    Check,
}

/// Badge for one-shot commands; nobody is looking at it.
struct LoggedBadge;

impl BadgeSink for LoggedBadge {
    fn set_badge_text(&self, text: &str) {
        debug!("Badge: {:?}", text);
    }
}

/// Puts the badge into the terminal window title.
struct TerminalTitleBadge;

impl BadgeSink for TerminalTitleBadge {
    fn set_badge_text(&self, text: &str) {
        let title = if text.is_empty() {
            "gitlab-timer".to_string()
        } else {
            format!("gitlab-timer {text}")
        };
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\x1b]2;{title}\x07");
        let _ = stdout.flush();
    }
}

struct Session {
    handle: CoordinatorHandle,
    credentials: Arc<dyn CredentialSource>,
    config: ConfigManager,
    secrets: SecretsManager,
    clock: Arc<dyn Clock>,
}

impl Session {
    fn open(badge: Arc<dyn BadgeSink>) -> Result<Self, String> {
        let config = ConfigManager::new()?;
        let secrets = SecretsManager::new();
        let credentials: Arc<dyn CredentialSource> =
            Arc::new(StoredCredentials::new(config.clone(), secrets.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let handle = coordinator::spawn(Services {
            store: LocalStore::new()?,
            credentials: Arc::clone(&credentials),
            badge,
            clock: Arc::clone(&clock),
            broadcaster: Broadcaster::new(),
        })?;
        Ok(Self {
            handle,
            credentials,
            config,
            secrets,
            clock,
        })
    }

    fn popup(&self) -> PopupView {
        let mut view = PopupView::new(
            self.credentials.gitlab_url(),
            self.config.load().popup_recent_limit,
        );
        view.set_state(self.handle.timer_state());
        view
    }
}

/// Runs one parsed command line to completion.
pub async fn execute(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Config(command) => {
            let config = ConfigManager::new()?;
            let secrets = SecretsManager::new();
            let credentials = StoredCredentials::new(config.clone(), secrets.clone());
            print_lines(run_config(command, &config, &secrets, &credentials).await?);
            Ok(())
        }
        Commands::Watch => watch(Session::open(Arc::new(TerminalTitleBadge))?).await,
        command => {
            let session = Session::open(Arc::new(LoggedBadge))?;
            let (_, mut pushes) = session.handle.subscribe(RecipientKind::ExtensionPage);
            let result = dispatch(&session, command).await;
            // Pushes raised while handling the request are already queued.
            print_lines(drain_messages(&mut pushes));
            print_lines(result?);
            Ok(())
        }
    }
}

async fn dispatch(session: &Session, command: Commands) -> Result<Vec<String>, String> {
    match command {
        Commands::Start(args) => {
            let issue = resolve_issue(args, session.credentials.as_ref()).await?;
            let response = session.handle.start_timer(issue.clone()).await?;
            Ok(vec![format!(
                "{}: {} (#{})",
                status_text(&response)?,
                issue.title,
                issue.id
            )])
        }
        Commands::Stop => Ok(vec![status_text(&session.handle.stop_timer().await?)?]),
        Commands::Cancel => Ok(vec![status_text(&session.handle.cancel_timer().await?)?]),
        Commands::Status => {
            let mut view = session.popup();
            view.set_tasks(session.handle.tasks().await?);
            Ok(status_lines(&view, session.clock.now_millis()))
        }
        Commands::Tasks => {
            let mut view = PopupView::new(session.credentials.gitlab_url(), usize::MAX);
            view.set_tasks(session.handle.tasks().await?);
            let rows = view.recent();
            if rows.is_empty() {
                return Ok(vec!["No tasks tracked yet".to_string()]);
            }
            Ok(rows.iter().map(task_line).collect())
        }
        Commands::Log { issue, duration } => {
            let issue = resolve_issue(issue, session.credentials.as_ref()).await?;
            match session.handle.log_time(issue, duration.join(" ")).await? {
                Response::LogResult {
                    success: true,
                    message,
                } => Ok(vec![message]),
                Response::LogResult { message, .. } => Err(message),
                other => Err(format!("Unexpected response: {other:?}")),
            }
        }
        Commands::Favorite { issue, remove } => {
            let issue = resolve_issue(issue, session.credentials.as_ref()).await?;
            let tasks = session.handle.set_favorite(issue.clone(), !remove).await?;
            let verb = if remove { "Removed from" } else { "Added to" };
            Ok(vec![format!(
                "{} favorites: {} (#{}), {} task(s) listed",
                verb,
                issue.title,
                issue.id,
                tasks.len()
            )])
        }
        Commands::Config(command) => {
            run_config(
                command,
                &session.config,
                &session.secrets,
                session.credentials.as_ref(),
            )
            .await
        }
        Commands::Watch => Err("Already watching".to_string()),
    }
}

async fn watch(session: Session) -> Result<(), String> {
    let (recipient, mut pushes) = session.handle.subscribe(RecipientKind::ExtensionPage);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    print_lines(status_lines(&session.popup(), session.clock.now_millis()));
    println!("Type a command such as `stop`, `status` or `start --url <issue>`, or `quit`.");

    loop {
        tokio::select! {
            Some(push) = pushes.recv() => {
                if let Some(line) = push_line(&push, session.clock.now_millis()) {
                    println!("{line}");
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => return Err(format!("Failed to read stdin: {err}")),
                };
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    [] => continue,
                    ["quit"] | ["exit"] => break,
                    _ => {}
                }
                let parsed = Cli::try_parse_from(std::iter::once("gitlab-timer").chain(words));
                match parsed {
                    Ok(cli) => match dispatch(&session, cli.command).await {
                        Ok(output) => print_lines(output),
                        Err(err) => eprintln!("{err}"),
                    },
                    Err(err) => eprintln!("{err}"),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    session.handle.broadcaster().detach(recipient);
    Ok(())
}

async fn run_config(
    command: ConfigCommand,
    config: &ConfigManager,
    secrets: &SecretsManager,
    credentials: &dyn CredentialSource,
) -> Result<Vec<String>, String> {
    match command {
        ConfigCommand::Show => {
            let current = config.load();
            let token = match secrets.get_token() {
                Ok(Some(token)) => mask_token(&token),
                Ok(None) => "not set".to_string(),
                Err(err) => format!("unavailable ({err})"),
            };
            Ok(vec![
                format!(
                    "GitLab URL:   {}",
                    current
                        .effective_gitlab_url()
                        .unwrap_or_else(|| "not set".to_string())
                ),
                format!("API token:    {token}"),
                format!("Recent limit: {}", current.popup_recent_limit),
                format!("Config file:  {}", config.path().display()),
                format!("Data file:    {}", LocalStore::new()?.path().display()),
            ])
        }
        ConfigCommand::SetUrl { url } => {
            let url = normalize_gitlab_url(&url)?;
            let mut current = config.load();
            current.gitlab_url = Some(url.clone());
            config
                .save(&current)
                .map_err(|err| format!("Failed to save config: {err}"))?;
            Ok(vec![format!("GitLab URL set to {url}")])
        }
        ConfigCommand::SetToken { token } => {
            secrets.save_token(&token)?;
            Ok(vec![format!("API token stored ({})", mask_token(token.trim()))])
        }
        ConfigCommand::ClearToken => {
            secrets.clear_token()?;
            Ok(vec!["API token removed".to_string()])
        }
        ConfigCommand::SetRecentLimit { limit } => {
            if limit == 0 {
                return Err("Recent limit must be at least 1".to_string());
            }
            let mut current = config.load();
            current.popup_recent_limit = limit;
            config
                .save(&current)
                .map_err(|err| format!("Failed to save config: {err}"))?;
            Ok(vec![format!("Recent list shows {limit} task(s)")])
        }
        ConfigCommand::Check => check_credentials(credentials).await.map(|line| vec![line]),
    }
}

async fn check_credentials(credentials: &dyn CredentialSource) -> Result<String, String> {
    let client = gitlab_client(credentials)
        .ok_or_else(|| coordinator::MISSING_CONFIG_MESSAGE.to_string())??;
    let user = client
        .current_user()
        .await
        .map_err(|err| err.user_message())?;
    let display = user.name.as_deref().unwrap_or(&user.username);
    Ok(format!("Authenticated as {} (@{})", display, user.username))
}

fn gitlab_client(credentials: &dyn CredentialSource) -> Option<Result<GitLabClient, String>> {
    let credentials = credentials.credentials()?;
    let config = GitLabConfig::new(credentials.gitlab_url, credentials.api_token)
        .with_timeout(LOOKUP_TIMEOUT);
    Some(GitLabClient::new(config).map_err(|err| err.user_message()))
}

/// Turns `--url` or `--project/--issue` into an `Issue`, fetching the title when it was not given.
async fn resolve_issue(
    args: IssueArgs,
    credentials: &dyn CredentialSource,
) -> Result<Issue, String> {
    let mut facts = match (args.url, args.project, args.issue) {
        (Some(url), _, _) => IssueUrlScraper::new(url.clone(), args.title)
            .page_facts()
            .ok_or_else(|| format!("Invalid issue URL: {url}"))?,
        (None, Some(project), Some(issue)) => PageFacts {
            pathname: format!("/issues/{}", issue.trim()),
            title: args.title,
            project_id: Some(project),
            ..Default::default()
        },
        _ => return Err("Pass --url, or both --project and --issue".to_string()),
    };

    let has_title = facts
        .title
        .as_deref()
        .is_some_and(|title| !title.trim().is_empty());
    if !has_title {
        let id = issue_id_from_path(&facts.pathname)
            .ok_or_else(|| "Could not find an issue number".to_string())?;
        let project = facts
            .project_id
            .clone()
            .ok_or_else(|| "Could not find the project".to_string())?;
        let (title, web_url) = fetch_issue(credentials, &project, &id).await;
        facts.title = Some(title);
        if facts.href.is_empty() {
            facts.href = web_url.unwrap_or_default();
        }
    }

    detect_issue(&facts).ok_or_else(|| "Not a GitLab issue".to_string())
}

async fn fetch_issue(
    credentials: &dyn CredentialSource,
    project: &str,
    id: &str,
) -> (String, Option<String>) {
    let fallback = (format!("Issue #{id}"), None);
    let client = match gitlab_client(credentials) {
        Some(Ok(client)) => client,
        Some(Err(err)) => {
            warn!("Cannot reach GitLab for issue title: {}", err);
            return fallback;
        }
        None => return fallback,
    };
    match client.get_issue(project, id).await {
        Ok(issue) => (issue.title, issue.web_url),
        Err(err) => {
            warn!("Failed to fetch issue #{} in {}: {}", id, project, err);
            fallback
        }
    }
}

fn status_text(response: &Response) -> Result<String, String> {
    match response {
        Response::Status { status } => Ok(status.clone()),
        other => Err(format!("Unexpected response: {other:?}")),
    }
}

fn status_lines(view: &PopupView, now: i64) -> Vec<String> {
    let mut lines = match view.timer_panel(now) {
        TimerPanel::Running {
            title,
            reference,
            link,
            clock,
        } => vec![format!("{clock}  {title} {reference}"), format!("        {link}")],
        TimerPanel::Idle => vec![IDLE_LABEL.to_string()],
    };

    let recent = view.recent();
    if !recent.is_empty() {
        lines.push(String::new());
        lines.push("Recent:".to_string());
        lines.extend(recent.iter().map(task_line));
    }
    let favorites = view.favorites();
    if !favorites.is_empty() {
        lines.push(String::new());
        lines.push("Favorites:".to_string());
        lines.extend(favorites.iter().map(task_line));
    }
    lines
}

fn task_line(row: &TaskRow) -> String {
    let star = if row.favorite { '*' } else { ' ' };
    let mut line = format!(
        "{star} #{} {} [{}]",
        row.issue.id, row.issue.title, row.issue.project_id
    );
    if let Some(date) = &row.last_tracked {
        line.push_str(&format!("  last tracked {date}"));
    }
    line
}

fn push_line(push: &Push, now: i64) -> Option<String> {
    match push {
        Push::ShowMessage { message, is_error } if *is_error => Some(format!("error: {message}")),
        Push::ShowMessage { message, .. } => Some(message.clone()),
        Push::TimerStateChanged { timer_state } => {
            Some(match TimerPanel::from_state(timer_state, now, None) {
                TimerPanel::Running { title, reference, .. } => {
                    format!("Tracking {title} {reference}")
                }
                TimerPanel::Idle => IDLE_LABEL.to_string(),
            })
        }
    }
}

fn drain_messages(pushes: &mut UnboundedReceiver<Push>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(push) = pushes.try_recv() {
        if let Push::ShowMessage { .. } = push {
            lines.extend(push_line(&push, 0));
        }
    }
    lines
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::test_support::StaticCredentials;
    use crate::storage::unique_path;
    use crate::timer::test_clock::ManualClock;

    const START: i64 = 1_700_000_000_000;

    fn session(name: &str, credentials: StaticCredentials) -> Session {
        let path = unique_path(name);
        let credentials: Arc<dyn CredentialSource> = Arc::new(credentials);
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(START));
        let handle = coordinator::spawn(Services {
            store: LocalStore::at(path.clone()),
            credentials: Arc::clone(&credentials),
            badge: Arc::new(LoggedBadge),
            clock: Arc::clone(&clock),
            broadcaster: Broadcaster::new(),
        })
        .expect("spawn coordinator");
        Session {
            handle,
            credentials,
            config: ConfigManager::at(path.with_file_name("config.json")),
            secrets: SecretsManager::with_service("gitlab-timer-tests"),
            clock,
        }
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gitlab-timer").chain(args.iter().copied()))
    }

    #[test]
    fn parses_issue_selection() {
        let cli =
            parse(&["start", "--project", "42", "--issue", "7", "--title", "Fix"]).expect("start");
        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.project.as_deref(), Some("42"));
                assert_eq!(args.issue.as_deref(), Some("7"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = parse(&[
            "log",
            "--url",
            "https://gitlab.example.com/g/a/-/issues/3",
            "1h",
            "30m",
        ])
        .expect("log");
        assert!(matches!(
            cli.command,
            Commands::Log { ref duration, .. } if duration.join(" ") == "1h 30m"
        ));

        assert!(parse(&["start", "--url", "https://x/-/issues/1", "--project", "1"]).is_err());
        assert!(parse(&["start", "--project", "42"]).is_err());
        assert!(parse(&["config", "set-url", "https://gitlab.example.com"]).is_ok());
    }

    #[tokio::test]
    async fn resolves_issue_from_url_and_fetches_missing_title() {
        let mut server = mockito::Server::new_async().await;
        let fetched = server
            .mock("GET", "/api/v4/projects/group%2Fapp/issues/7")
            .with_status(200)
            .with_body(r#"{"id":900,"iid":7,"project_id":42,"title":"Fetched title"}"#)
            .create_async()
            .await;
        let credentials = StaticCredentials::configured(server.url());

        let issue = resolve_issue(
            IssueArgs {
                url: Some(format!("{}/group/app/-/issues/7", server.url())),
                project: None,
                issue: None,
                title: None,
            },
            &credentials,
        )
        .await
        .expect("issue");

        fetched.assert_async().await;
        assert_eq!(issue.title, "Fetched title");
        assert_eq!(issue.project_id, "group/app");
        assert_eq!(issue.id, "7");
    }

    #[tokio::test]
    async fn unreachable_title_lookup_falls_back_to_number() {
        let issue = resolve_issue(
            IssueArgs {
                url: None,
                project: Some("42".to_string()),
                issue: Some("9".to_string()),
                title: None,
            },
            &StaticCredentials::missing(),
        )
        .await
        .expect("issue");
        assert_eq!(issue, Issue::new("Issue #9", "9", "42"));
    }

    #[tokio::test]
    async fn start_then_status_renders_timer_and_recent_list() {
        let session = session(
            "cli-status",
            StaticCredentials::configured("https://gitlab.example.com"),
        );
        let start = dispatch(
            &session,
            parse(&["start", "--project", "42", "--issue", "7", "--title", "Fix login"])
                .expect("parse")
                .command,
        )
        .await
        .expect("start");
        assert_eq!(start, vec!["Timer started: Fix login (#7)".to_string()]);

        let lines = dispatch(&session, Commands::Status).await.expect("status");
        assert_eq!(lines[0], "00:00  Fix login (#7)");
        assert_eq!(
            lines[1].trim(),
            "https://gitlab.example.com/-/projects/42/issues/7"
        );
        assert_eq!(lines[3], "Recent:");
        assert!(lines[4].starts_with("  #7 Fix login [42]"));
    }

    #[tokio::test]
    async fn failed_manual_log_is_an_error() {
        let session = session("cli-log", StaticCredentials::missing());
        let result = dispatch(
            &session,
            parse(&["log", "--project", "42", "--issue", "7", "--title", "T", "15m"])
                .expect("parse")
                .command,
        )
        .await;
        assert_eq!(result, Err(coordinator::MISSING_CONFIG_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn config_commands_update_file() {
        let session = session("cli-config", StaticCredentials::missing());
        let lines = run_config(
            ConfigCommand::SetUrl {
                url: "https://gitlab.example.com/".to_string(),
            },
            &session.config,
            &session.secrets,
            session.credentials.as_ref(),
        )
        .await
        .expect("set url");
        assert_eq!(lines, vec!["GitLab URL set to https://gitlab.example.com".to_string()]);

        run_config(
            ConfigCommand::SetRecentLimit { limit: 3 },
            &session.config,
            &session.secrets,
            session.credentials.as_ref(),
        )
        .await
        .expect("set limit");
        let stored = session.config.load();
        assert_eq!(stored.gitlab_url.as_deref(), Some("https://gitlab.example.com"));
        assert_eq!(stored.popup_recent_limit, 3);

        assert!(run_config(
            ConfigCommand::SetRecentLimit { limit: 0 },
            &session.config,
            &session.secrets,
            session.credentials.as_ref(),
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn check_reports_authenticated_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/user")
            .with_status(200)
            .with_body(r#"{"id":1,"username":"jdoe","name":"Jane Doe"}"#)
            .create_async()
            .await;

        let line = check_credentials(&StaticCredentials::configured(server.url()))
            .await
            .expect("check");
        assert_eq!(line, "Authenticated as Jane Doe (@jdoe)");

        assert_eq!(
            check_credentials(&StaticCredentials::missing()).await,
            Err(coordinator::MISSING_CONFIG_MESSAGE.to_string())
        );
    }

    #[test]
    fn push_lines_mark_errors() {
        assert_eq!(
            push_line(&Push::error("quota exceeded"), 0).as_deref(),
            Some("error: quota exceeded")
        );
        assert_eq!(
            push_line(&Push::TimerStateChanged { timer_state: Default::default() }, 0).as_deref(),
            Some(IDLE_LABEL)
        );
    }
}
