//! grobline - harvest conference PDFs and extract TEI with GROBID
//!
//! Reads a CSV manifest of papers, downloads each PDF into its own folder,
//! then converts it to TEI XML through a running GROBID service.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;
use grobline_core::{
    INTERRUPTED_EXIT_CODE, ProgressContext, SharedProgress, Verbosity, init_logging,
    install_signal_handlers, is_shutdown_requested,
};

#[derive(Parser)]
#[command(name = "grobline")]
#[command(about = "Download conference PDFs and extract TEI with GROBID")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./grobline.toml or ~/.config/grobline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Download PDFs and extract TEI for every manifest row
    Run(cmd::run::RunArgs),
    /// Show the effective configuration (file, environment and flags merged)
    Config(cmd::run::RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // TTY: warnings only unless --debug, the bars show activity.
    // Non-TTY: info lines are the only progress indicator.
    let is_tty = progress.is_tty();
    let verbosity = match (cli.debug, is_tty) {
        (true, _) => Verbosity::Debug,
        (false, true) => Verbosity::Quiet,
        (false, false) => Verbosity::Normal,
    };
    init_logging(verbosity, is_tty.then(|| progress.multi()));

    if let Err(e) = install_signal_handlers() {
        log::warn!("Failed to install signal handlers: {e}");
    }

    match dispatch(cli, &progress) {
        Ok(()) if is_shutdown_requested() => {
            log::warn!("Interrupted; re-run to resume");
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli, progress: &SharedProgress) -> Result<()> {
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, progress).map(|_| ()),
        Command::Config(args) => {
            print_config(&args.resolve(&config)?);
            Ok(())
        }
    }
}

fn print_config(config: &grobline_papers::Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Manifest", &config.manifest.display().to_string()]);
    table.add_row(vec![
        "Output directory",
        &config.output_dir.display().to_string(),
    ]);
    table.add_row(vec!["GROBID URL", &config.grobid_url]);
    table.add_row(vec![
        "Sleep",
        &format!("{}s", config.sleep.as_secs_f64()),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} attempts, {}s linear backoff",
            config.retry.attempts,
            config.retry.backoff_base.as_secs_f64()
        ),
    ]);
    table.add_row(vec![
        "Batch",
        &match config.batch.end() {
            Some(end) => format!("rows [{}:{end}]", config.batch.start),
            None => "all rows".to_string(),
        },
    ]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "download {}s stall, GROBID {}s",
            config.download_timeout.as_secs(),
            config.extract_timeout.as_secs()
        ),
    ]);

    eprintln!("\n{table}");
}
