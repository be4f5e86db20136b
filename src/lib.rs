use clap::Parser;
use log::{error, info};

pub mod bridge;
pub mod broadcast;
mod cli;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod duration;
pub mod format;
pub mod messages;
pub mod page;
pub mod popup;
pub mod secrets;
pub mod storage;
pub mod tasks;
pub mod timer;

pub use bridge::{Issue, RecentTask, TaskEntry};
pub use coordinator::{spawn, BadgeSink, CoordinatorHandle, Services};
pub use messages::{Push, Request, Response};
pub use timer::TimerState;

pub fn run() {
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();

    let cli = cli::Cli::parse();
    info!("Starting gitlab-timer {}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::execute(cli)) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
