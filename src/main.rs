//! droidusage - Analyze Factory Droid AI usage data from local session files

use clap::Parser;
use droidusage::{
    cli::{build_date_range, build_selection, Cli, Command},
    data_loader::DataLoader,
    error::Result,
    output::get_formatter,
    pricing::PricingTable,
    service::UsageService,
};
use is_terminal::IsTerminal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("droidusage=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let loader = match &cli.sessions_dir {
        Some(dir) => DataLoader::new(dir),
        None => DataLoader::discover()?,
    };
    info!("Sessions directory: {}", loader.sessions_dir().display());

    let show_progress = !cli.json && std::io::stdout().is_terminal();
    let service = UsageService::new(loader, PricingTable::builtin()).with_progress(show_progress);

    let range = build_date_range(cli.since.as_deref(), cli.until.as_deref())?;
    let formatter = get_formatter(cli.json);

    match cli.command.unwrap_or(Command::Daily) {
        Command::Daily => {
            info!("Running daily usage report");
            let report = service.daily_usage(range).await?;
            println!("{}", formatter.format_daily(&report));
        }
        Command::Sessions => {
            info!("Running per-session usage report");
            let report = service.session_usage(range).await?;
            println!("{}", formatter.format_sessions(&report));
        }
        Command::Blocks => {
            info!("Running 5-hour block report");
            let report = service.block_usage(range).await?;
            println!("{}", formatter.format_blocks(&report));
        }
        Command::Top { by, limit } => {
            info!("Running top-sessions report");
            let report = service.top_sessions(range, by.into(), limit).await?;
            println!("{}", formatter.format_top(&report));
        }
        Command::Trends => {
            info!("Running trends analysis");
            let report = service.trends_analysis(range).await?;
            println!("{}", formatter.format_trends(&report));
        }
        Command::Analyze {
            cost,
            patterns,
            efficiency,
            all,
        } => {
            info!("Running statistical analysis");
            let selection = build_selection(cost, patterns, efficiency, all);
            let report = service.run_analysis(range, selection).await?;
            println!("{}", formatter.format_analysis(&report));
        }
    }

    Ok(())
}
