mod common;

use common::{circuit, mx_device, with_wan1, with_wan2, InMemoryStore};
use dsr_circuits::app::pipelines::enrichment_pipeline::ENRICHMENT_REPORT;
use dsr_circuits::app::pipelines::EnrichmentPipeline;
use dsr_circuits::domain::enrichment::EnrichmentSettings;
use dsr_circuits::domain::provider::AliasTable;
use dsr_circuits::{EtlEngine, LocalStorage};
use std::sync::Arc;
use tempfile::TempDir;

fn seeded_store() -> InMemoryStore {
    let cal = with_wan2(
        with_wan1(
            mx_device("CAL 24", "WAN 1 Comcast 300M x 30M WAN 2 AT&T 50M x 10M"),
            "24.1.1.10",
            "Comcast",
        ),
        "107.1.1.20",
        "AT&T",
    );
    let txs = with_wan1(
        mx_device("TXS 9", "WAN1 Spectrum 500M x 20M"),
        "71.1.1.30",
        "Charter Communications",
    );
    let hub = with_wan1(mx_device("HUB 1", "WAN1 AT&T 1G x 1G"), "12.1.1.1", "AT&T");

    InMemoryStore::new()
        .with_circuits(vec![
            circuit("CAL 24", "Primary", "Comcast", Some("24.1.1.10")),
            circuit("CAL 24", "Secondary", "AT&T", None),
        ])
        .with_devices(vec![cal, txs, hub])
}

fn pipeline(store: Arc<InMemoryStore>, dir: &TempDir) -> EnrichmentPipeline<InMemoryStore, LocalStorage> {
    EnrichmentPipeline::new(
        store,
        LocalStorage::new(dir.path()),
        AliasTable::with_defaults(),
        EnrichmentSettings::default(),
    )
}

#[tokio::test]
async fn test_enrichment_uses_dsr_circuits_and_falls_back_to_arin() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(seeded_store());

    let summary = EtlEngine::new(pipeline(store.clone(), &temp_dir))
        .run()
        .await
        .unwrap();
    assert!(summary.starts_with("2 of 2 sites written"), "{}", summary);

    let cal = store.enriched_row("CAL 24").expect("CAL 24 enriched");
    assert_eq!(cal.wan1_provider, "Comcast");
    assert_eq!(cal.wan1_speed, "300.0M x 30.0M");
    assert_eq!(cal.wan1_cost, "$125.50");
    assert_eq!(cal.wan1_role, "Primary");
    assert!(cal.wan1_confirmed);
    assert_eq!(cal.wan2_provider, "AT&T");
    assert_eq!(cal.wan2_role, "Secondary");
    assert!(cal.wan2_confirmed);

    // 沒有 DSR 電路：notes 與 ARIN 一致時採用 ARIN 名稱
    let txs = store.enriched_row("TXS 9").expect("TXS 9 enriched");
    assert_eq!(txs.wan1_provider, "Charter Communications");
    assert_eq!(txs.wan1_speed, "500.0M x 20.0M");
    assert_eq!(txs.wan1_cost, "$0.00");
    assert_eq!(txs.wan1_role, "Primary");
    assert!(!txs.wan1_confirmed);
    assert_eq!(txs.wan2_provider, "");
    assert_eq!(txs.wan2_role, "Secondary");

    assert!(store.enriched_row("HUB 1").is_none());

    let report = std::fs::read_to_string(temp_dir.path().join(ENRICHMENT_REPORT)).unwrap();
    assert!(report.starts_with("network_name,wan1_provider"));
    assert!(report.contains("CAL 24,Comcast"));
    assert!(!report.contains("HUB 1"));
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(seeded_store());

    EtlEngine::new(pipeline(store.clone(), &temp_dir))
        .run()
        .await
        .unwrap();
    assert_eq!(*store.enriched_writes.lock().unwrap(), 2);

    let summary = EtlEngine::new(pipeline(store.clone(), &temp_dir))
        .run()
        .await
        .unwrap();
    assert!(summary.starts_with("0 of 2 sites written"), "{}", summary);
    assert_eq!(*store.enriched_writes.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_confirmed_values_survive_circuit_removal() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(seeded_store());

    EtlEngine::new(pipeline(store.clone(), &temp_dir))
        .run()
        .await
        .unwrap();

    // Secondary 電路停用後，已確認的 WAN2 資料保留
    for c in store.circuits.lock().unwrap().iter_mut() {
        if c.circuit_purpose.as_deref() == Some("Secondary") {
            c.status = Some("Disconnected".to_string());
        }
    }

    EtlEngine::new(pipeline(store.clone(), &temp_dir))
        .run()
        .await
        .unwrap();

    let cal = store.enriched_row("CAL 24").unwrap();
    assert_eq!(cal.wan2_provider, "AT&T");
    assert_eq!(cal.wan2_role, "Secondary");
    assert!(cal.wan2_confirmed);
}

#[tokio::test]
async fn test_dry_run_leaves_store_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(seeded_store());

    let summary = EtlEngine::new(pipeline(store.clone(), &temp_dir).with_dry_run(true))
        .run()
        .await
        .unwrap();

    assert!(summary.starts_with("0 of 2 sites written"), "{}", summary);
    assert!(store.enriched.lock().unwrap().is_empty());
    assert!(temp_dir.path().join(ENRICHMENT_REPORT).exists());
}
