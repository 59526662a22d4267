use super::toml_config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dsr-circuits")]
#[command(about = "DSR circuit reconciliation: Meraki inventory, ARIN lookups, enrichment and reports")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines (for cron runs)")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory per pipeline phase")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Compute and report without writing to the database")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply SQL migrations
    Migrate,
    /// Pull MX devices and uplinks from Meraki and resolve ARIN providers
    RefreshInventory,
    /// Rebuild enriched_circuits
    Enrich,
    /// Write the DSR vs ARIN provider match report
    MatchReport,
    /// Match one provider pair and print the outcome
    Match {
        dsr: String,
        arin: String,
        #[arg(long, help = "Primary or Secondary")]
        purpose: Option<String>,
    },
    /// Import a DSR tracking CSV export and record new enablements
    ImportTracking {
        csv: String,
        #[arg(long, help = "Previous day's export, for enablement detection")]
        previous: Option<String>,
        #[arg(long, help = "Report date (YYYY-MM-DD), defaults to today")]
        date: Option<chrono::NaiveDate>,
    },
    /// Classify an entity-MIB JSON dump into a hardware inventory
    ClassifyHardware { input: String },
    /// Parse free-text device notes into WAN provider/speed
    ParseNotes { text: String },
    /// Inventory refresh, tracking import, enrichment and match report as jobs
    Nightly,
    /// Run an external script as a tracked job and stream its output
    RunScript {
        program: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Command {
    /// Commands that run without a database; the config file is optional for them.
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            Command::Match { .. }
                | Command::ParseNotes { .. }
                | Command::ClassifyHardware { .. }
                | Command::RunScript { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dsr-circuits", "enrich", "--dry-run", "-v"]);
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert_eq!(cli.config, DEFAULT_CONFIG_FILE);
        assert!(matches!(cli.command, Command::Enrich));
    }

    #[test]
    fn test_parse_match_with_purpose() {
        let cli = Cli::parse_from([
            "dsr-circuits",
            "match",
            "Comcast",
            "AT&T",
            "--purpose",
            "Secondary",
        ]);
        match cli.command {
            Command::Match { dsr, arin, purpose } => {
                assert_eq!(dsr, "Comcast");
                assert_eq!(arin, "AT&T");
                assert_eq!(purpose.as_deref(), Some("Secondary"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_import_tracking_date() {
        let cli = Cli::parse_from([
            "dsr-circuits",
            "--config",
            "/etc/dsr.toml",
            "import-tracking",
            "today.csv",
            "--previous",
            "yesterday.csv",
            "--date",
            "2025-06-30",
        ]);
        assert_eq!(cli.config, "/etc/dsr.toml");
        match cli.command {
            Command::ImportTracking { csv, previous, date } => {
                assert_eq!(csv, "today.csv");
                assert_eq!(previous.as_deref(), Some("yesterday.csv"));
                assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2025, 6, 30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_script_keeps_hyphen_args() {
        let cli = Cli::parse_from(["dsr-circuits", "run-script", "python3", "sync.py", "--full"]);
        match cli.command {
            Command::RunScript { program, args } => {
                assert_eq!(program, "python3");
                assert_eq!(args, vec!["sync.py", "--full"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
