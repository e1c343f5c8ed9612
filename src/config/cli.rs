use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "okr-metrics")]
#[command(about = "Reconcile OKR dashboard KRs with the metrics spreadsheet")]
pub struct CliArgs {
    /// Path to TOML dashboard configuration file
    #[arg(short, long, default_value = "okr-config.toml")]
    pub config: String,

    /// Override the spreadsheet path from [source]
    #[arg(long)]
    pub source: Option<String>,

    /// Override the output directory from [load]
    #[arg(long)]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Build the dashboard and log the match table without writing any output
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let args = CliArgs::parse_from([
            "okr-metrics",
            "--config",
            "dash.toml",
            "--source",
            "okrs.csv",
            "--dry-run",
        ]);
        assert_eq!(args.config, "dash.toml");
        assert_eq!(args.source.as_deref(), Some("okrs.csv"));
        assert!(args.dry_run);
        assert!(!args.verbose);
        assert!(args.output.is_none());
    }
}
