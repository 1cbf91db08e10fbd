use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use f2b_dashboard::config::Config;
use f2b_dashboard::fail2ban::Fail2banClient;
use f2b_dashboard::log_reader::LogReader;
use f2b_dashboard::report;
use f2b_dashboard::runner::{CommandRunner, SudoRunner};
use f2b_dashboard::web::{self, AppState};

#[derive(Parser)]
#[command(name = "f2b_dashboard")]
#[command(about = "Web dashboard for fail2ban jails, bans and log activity")]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard (default)
    Serve,

    /// Print a report for one jail and exit
    Report {
        /// Jail to report on
        #[arg(short, long)]
        jail: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Show top N IPs per section
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,f2b_dashboard=debug")),
        )
        .init();

    let args = Args::parse();
    let runner: Arc<dyn CommandRunner> = Arc::new(SudoRunner::new(!args.config.no_sudo));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(args.config, runner).await,
        Command::Report { jail, format, top } => {
            let fail2ban = Fail2banClient::with_activity_log(runner.clone(), args.config.fail2ban_log);
            let logs = LogReader::new(runner);
            let report = report::build_report(&fail2ban, &logs, &jail).await;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => print!("{}", report::render_text_report(&report, top)),
            }
            Ok(())
        }
    }
}

async fn serve(config: Config, runner: Arc<dyn CommandRunner>) -> Result<()> {
    let state = AppState::new(runner, &config)?;
    let app = web::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
