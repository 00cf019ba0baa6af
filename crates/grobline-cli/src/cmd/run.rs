//! `grobline run` - download PDFs and extract TEI for every manifest row

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use grobline_core::{SharedProgress, fmt_num};
use grobline_papers::Summary;

use crate::config::{Config, secs};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// CSV manifest with paper_id, forum, title, pdf_url columns
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Root directory for per-paper folders
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// GROBID service base URL
    #[arg(long, env = "GROBID_URL")]
    pub grobid_url: Option<String>,

    /// Seconds to pause after each GROBID extraction
    #[arg(long, env = "GROBID_SLEEP")]
    pub sleep: Option<f64>,

    /// 0-based index of the first manifest row to process
    #[arg(long, env = "GROBID_BATCH_START")]
    pub batch_start: Option<usize>,

    /// Number of rows to process (default: all)
    #[arg(long, env = "GROBID_BATCH_SIZE")]
    pub batch_size: Option<usize>,
}

impl RunArgs {
    /// Overlay flags and environment onto the file configuration.
    pub fn resolve(self, config: &Config) -> Result<grobline_papers::Config> {
        let mut resolved = config.pipeline()?;
        if let Some(manifest) = self.manifest {
            resolved.manifest = manifest;
        }
        if let Some(output) = self.output {
            resolved.output_dir = output;
        }
        if let Some(url) = self.grobid_url {
            resolved.grobid_url = url;
        }
        if let Some(sleep) = self.sleep {
            resolved.sleep = secs(sleep, "sleep")?;
        }
        if let Some(start) = self.batch_start {
            resolved.batch.start = start;
        }
        if let Some(size) = self.batch_size {
            resolved.batch.size = Some(size);
        }
        Ok(resolved)
    }
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<Summary> {
    let run_config = args.resolve(config)?;
    let summary = grobline_papers::run(&run_config, progress.clone())?;
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &Summary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Harvest").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows = [
        ("Total rows", fmt_num(summary.total_rows)),
        (
            "Downloads",
            format!(
                "{} new, {} present",
                fmt_num(summary.downloaded),
                fmt_num(summary.skipped_downloads)
            ),
        ),
        ("Download errors", fmt_num(summary.download_errors())),
        (
            "Parses",
            format!(
                "{} new, {} present",
                fmt_num(summary.parsed),
                fmt_num(summary.skipped_parses)
            ),
        ),
        ("Parse errors", fmt_num(summary.parse_errors())),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    if let Some(path) = &summary.error_log {
        table.add_row(vec![
            Cell::new("Error log"),
            Cell::new(path.display().to_string()),
        ]);
    }
    if summary.interrupted {
        table.add_row(vec![
            Cell::new("Status").fg(Color::Yellow),
            Cell::new("interrupted").fg(Color::Yellow),
        ]);
    }
    eprintln!("\n{table}");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::*;

    /// `run` arguments parsed the way the binary parses them
    #[derive(Parser)]
    struct RunCli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        RunCli::try_parse_from(std::iter::once("grobline").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn env_overrides_file_and_flags_override_env() {
        let config: Config = toml::from_str(
            "[grobid]\nurl = \"http://file:8070\"\nsleep_secs = 2.0\n[batch]\nstart = 1\nsize = 3\n",
        )
        .unwrap();

        std::env::set_var("GROBID_URL", "http://env:8070");
        std::env::set_var("GROBID_SLEEP", "0.5");
        std::env::set_var("GROBID_BATCH_START", "10");
        std::env::set_var("GROBID_BATCH_SIZE", "25");
        let from_env = parse(&[]);
        let from_flags = parse(&["--grobid-url", "http://flag:8070", "--batch-size", "5"]);
        for var in [
            "GROBID_URL",
            "GROBID_SLEEP",
            "GROBID_BATCH_START",
            "GROBID_BATCH_SIZE",
        ] {
            std::env::remove_var(var);
        }

        let resolved = from_env.resolve(&config).unwrap();
        assert_eq!(resolved.grobid_url, "http://env:8070");
        assert_eq!(resolved.sleep, Duration::from_millis(500));
        assert_eq!(resolved.batch.start, 10);
        assert_eq!(resolved.batch.size, Some(25));

        let resolved = from_flags.resolve(&config).unwrap();
        assert_eq!(resolved.grobid_url, "http://flag:8070");
        assert_eq!(resolved.batch.size, Some(5));
        assert_eq!(resolved.batch.start, 10);
    }

    #[test]
    fn unset_env_falls_back_to_file() {
        let config: Config = toml::from_str("[paths]\nmanifest = \"file.csv\"\n").unwrap();
        let resolved = parse(&["--output", "out"]).resolve(&config).unwrap();
        assert_eq!(resolved.manifest, PathBuf::from("file.csv"));
        assert_eq!(resolved.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn flags_override_file_values() {
        let config: Config = toml::from_str(
            "[paths]\nmanifest = \"file.csv\"\n[grobid]\nurl = \"http://file:8070\"\n[batch]\nstart = 7\n",
        )
        .unwrap();
        let args = RunArgs {
            grobid_url: Some("http://flag:8070".into()),
            sleep: Some(0.0),
            batch_size: Some(10),
            ..Default::default()
        };

        let resolved = args.resolve(&config).unwrap();
        assert_eq!(resolved.manifest, PathBuf::from("file.csv"));
        assert_eq!(resolved.grobid_url, "http://flag:8070");
        assert_eq!(resolved.sleep, Duration::ZERO);
        assert_eq!(resolved.batch.start, 7);
        assert_eq!(resolved.batch.size, Some(10));
    }

    #[test]
    fn no_flags_keep_defaults() {
        let resolved = RunArgs::default().resolve(&Config::default()).unwrap();
        assert_eq!(resolved.output_dir, PathBuf::from("ICLR2025_papers"));
        assert_eq!(resolved.sleep, Duration::from_millis(200));
        assert_eq!(resolved.batch.size, None);
    }

    #[test]
    fn negative_sleep_flag_rejected() {
        let args = RunArgs {
            sleep: Some(-0.5),
            ..Default::default()
        };
        assert!(args.resolve(&Config::default()).is_err());
    }
}
