mod common;

use anyhow::Result;
use common::{circuit, mx_device, with_wan1, with_wan2, InMemoryStore};
use dsr_circuits::app::pipelines::match_report_pipeline::{MATCH_REPORT, SUGGESTED_MAPPINGS};
use dsr_circuits::app::pipelines::{MatchReportPipeline, ReportOptions};
use dsr_circuits::domain::model::ProviderMapping;
use dsr_circuits::domain::ports::Pipeline;
use dsr_circuits::domain::provider::{AliasTable, MatchStatus, MatcherSettings};
use dsr_circuits::{EtlEngine, LocalStorage};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

fn seeded_store() -> InMemoryStore {
    let cal = with_wan2(
        with_wan1(mx_device("CAL 24", ""), "24.1.1.10", "Comcast"),
        "107.1.1.20",
        "AT&T",
    );
    let ark = with_wan1(mx_device("ARK 3", ""), "64.1.1.1", "Windstream");
    let mon = with_wan1(mx_device("MON 5", ""), "65.1.1.1", "Zayo Group");
    let nev = mx_device("NEV 2", "");

    InMemoryStore::new()
        .with_circuits(vec![
            circuit("CAL 24", "Primary", "Comcast", Some("24.1.1.10")),
            circuit("CAL 24", "Secondary", "AT&T", Some("107.1.1.20")),
            circuit("ARK 3", "Primary", "Sparklight", None),
            circuit("MON 5", "Primary", "Acme Fiber Co", None),
            circuit("NEV 2", "Primary", "Cox Business", None),
        ])
        .with_devices(vec![cal, ark, mon, nev])
        .with_mappings(vec![ProviderMapping {
            dsr_provider: "Acme Fiber Co".to_string(),
            arin_provider: "Zayo Group".to_string(),
            mapping_type: "alias".to_string(),
            confidence_score: 100,
        }])
}

fn pipeline(store: Arc<InMemoryStore>, dir: &TempDir) -> MatchReportPipeline<InMemoryStore, LocalStorage> {
    MatchReportPipeline::new(
        store,
        LocalStorage::new(dir.path()),
        AliasTable::with_defaults(),
        MatcherSettings::default(),
    )
}

#[tokio::test]
async fn test_match_report_rows_and_suggestions() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let pipeline = pipeline(Arc::new(seeded_store()), &temp_dir);

    let input = pipeline.extract().await?;
    assert_eq!(input.pairs.len(), 5);

    let report = pipeline.transform(input).await?;
    assert_eq!(report.rows.len(), 4);
    assert_eq!(report.skipped_no_arin, 1);

    let row = |site: &str, purpose: &str| {
        report
            .rows
            .iter()
            .find(|r| r.site_name == site && r.circuit_purpose == purpose)
            .cloned()
            .unwrap()
    };

    let primary = row("CAL 24", "Primary");
    assert_eq!(primary.status, MatchStatus::Match);
    assert_eq!(primary.score, 100);

    // Secondary 電路依 IP 對到 WAN2
    let secondary = row("CAL 24", "Secondary");
    assert_eq!(secondary.arin_provider, "AT&T");
    assert_eq!(secondary.status, MatchStatus::Match);

    let mapped = row("MON 5", "Primary");
    assert_eq!(mapped.status, MatchStatus::Match);
    assert_eq!(mapped.score, 100);
    assert_eq!(mapped.reason, "Mapped via alias");

    let unmatched = row("ARK 3", "Primary");
    assert_eq!(unmatched.status, MatchStatus::NoMatch);

    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].dsr_provider, "Sparklight");
    assert_eq!(report.suggestions[0].arin_provider, "Windstream");
    assert_eq!(report.suggestions[0].mapping_type, "alias");

    assert_eq!(report.stats.total, 4);
    assert_eq!(report.stats.matched(), 3);
    Ok(())
}

#[tokio::test]
async fn test_match_report_writes_both_csv_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    EtlEngine::new(pipeline(Arc::new(seeded_store()), &temp_dir))
        .run()
        .await?;

    let report = std::fs::read_to_string(temp_dir.path().join(MATCH_REPORT))?;
    assert!(report.starts_with("site_name,site_id,circuit_purpose,dsr_provider"));
    assert!(report.contains("No Match"));
    assert_eq!(report.lines().count(), 5);

    let suggestions = std::fs::read_to_string(temp_dir.path().join(SUGGESTED_MAPPINGS))?;
    assert!(suggestions.contains("Sparklight,Windstream,alias"));
    Ok(())
}

#[tokio::test]
async fn test_match_report_compressed_bundle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let options = ReportOptions {
        compress: true,
        bundle_name: "reports.zip".to_string(),
    };

    let summary = EtlEngine::new(
        pipeline(Arc::new(seeded_store()), &temp_dir).with_report_options(options),
    )
    .run()
    .await?;
    assert!(summary.ends_with("reports.zip"), "{}", summary);
    assert!(!temp_dir.path().join(MATCH_REPORT).exists());

    let file = std::fs::File::open(temp_dir.path().join("reports.zip"))?;
    let mut archive = zip::ZipArchive::new(file)?;
    assert_eq!(archive.len(), 2);

    let mut contents = String::new();
    archive
        .by_name(MATCH_REPORT)?
        .read_to_string(&mut contents)?;
    assert!(contents.contains("MON 5"));
    assert!(archive.by_name(SUGGESTED_MAPPINGS).is_ok());
    Ok(())
}
