//! Bulk provider matching over a CSV of pairs, without a database.
//!
//! Input columns: `dsr_provider`, `arin_provider` and optionally
//! `circuit_purpose`. Output adds `status`, `confidence` and `reason`.

use anyhow::{Context, Result};
use clap::Parser;
use dsr_circuits::domain::model::CircuitPurpose;
use dsr_circuits::domain::provider::{AliasTable, MappingIndex, MatcherSettings, ProviderMatcher};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "provider_match")]
#[command(about = "Match DSR provider names against ARIN provider names")]
struct Args {
    /// CSV with dsr_provider,arin_provider[,circuit_purpose]
    input: PathBuf,

    /// Output CSV (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 80)]
    match_threshold: u8,
}

#[derive(Debug, Deserialize)]
struct PairRow {
    dsr_provider: String,
    arin_provider: String,
    #[serde(default)]
    circuit_purpose: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResultRow {
    dsr_provider: String,
    arin_provider: String,
    status: String,
    confidence: u8,
    reason: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = MatcherSettings {
        match_threshold: args.match_threshold,
        ..MatcherSettings::default()
    };
    let matcher = ProviderMatcher::new(AliasTable::with_defaults(), MappingIndex::default(), settings);

    let mut reader = csv::Reader::from_path(&args.input)
        .with_context(|| format!("cannot open {}", args.input.display()))?;

    let sink: Box<dyn std::io::Write> = match &args.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    for (line, row) in reader.deserialize::<PairRow>().enumerate() {
        let row = row.with_context(|| format!("bad row {}", line + 2))?;
        let purpose = row.circuit_purpose.as_deref().and_then(CircuitPurpose::parse);
        let outcome = matcher.match_providers(&row.dsr_provider, &row.arin_provider, purpose);

        writer.serialize(ResultRow {
            dsr_provider: row.dsr_provider,
            arin_provider: row.arin_provider,
            status: outcome.status.to_string(),
            confidence: outcome.confidence,
            reason: outcome.reason,
        })?;
    }
    writer.flush()?;

    let stats = matcher.stats();
    eprintln!(
        "📊 {} pairs, {} matched, {} possible, {} no match ({:.1}%)",
        stats.total,
        stats.matched(),
        stats.possible,
        stats.no_match,
        stats.match_rate()
    );
    Ok(())
}
