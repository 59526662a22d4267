use anyhow::Result;
use dsr_circuits::app::pipelines::hardware_pipeline::{COMPONENTS_REPORT, SUMMARY_REPORT};
use dsr_circuits::app::pipelines::HardwarePipeline;
use dsr_circuits::domain::ports::Pipeline;
use dsr_circuits::{EtlEngine, LocalStorage};
use serde_json::{json, Value};
use tempfile::TempDir;

fn entity_dump() -> Value {
    json!([
        {
            "hostname": "core-sw-01",
            "ip": "10.0.0.1",
            "status": "success",
            "entities": [
                {"entity_id": "1", "class": "3", "description": "Nexus 5596 Chassis", "model": "N5K-C5596UP", "serial": "FOC1"},
                {"entity_id": "10", "class": 6, "description": "PSU", "model_name": "N55-PAC-1100W", "serial_number": "PS1"},
                {"entity_id": "20", "class": 7, "description": "Fan Module", "model": "N5596UP-FAN", "serial": "FAN1"},
                {"entity_id": "30", "class": 10, "description": "10Gbase-SR SFP transceiver", "model": "SFP-10G-SR", "serial": "SFP1"},
                {"entity_id": "31", "class": 10, "description": "Ethernet1/1", "model": "", "serial": ""},
                {"entity_id": "40", "class": 8, "description": "Temperature sensor"},
                {
                    "entity_id": "50",
                    "class": 3,
                    "description": "Fabric Extender Module: 48x1GE, 4x10GE Supervisor",
                    "model": "Fabric Extender Module",
                    "serial": "FOX1"
                }
            ]
        },
        {
            "device_name": "core-sw-02",
            "ip": "10.0.0.2",
            "status": "success",
            "entities": [
                {"entity_id": "1", "class": 3, "description": "Nexus 5596 Chassis", "model": "N5K-C5596UP", "serial": "FOC1"},
                {"entity_id": "2", "class": 9, "description": "Expansion module", "model": "N55-M16P", "serial": "MOD1"}
            ]
        },
        {"hostname": "edge-01", "ip": "10.0.0.3", "status": "failed"}
    ])
}

fn pipeline(input: &TempDir, output: &TempDir) -> HardwarePipeline<LocalStorage> {
    std::fs::write(
        input.path().join("entities.json"),
        serde_json::to_vec(&entity_dump()).unwrap(),
    )
    .unwrap();
    HardwarePipeline::new(
        LocalStorage::new(input.path()),
        LocalStorage::new(output.path()),
        "entities.json",
    )
}

#[tokio::test]
async fn test_classification_counts() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let pipeline = pipeline(&input, &output);

    let devices = pipeline.extract().await?;
    assert_eq!(devices.len(), 3);

    let result = pipeline.transform(devices).await?;
    assert_eq!(result.devices.len(), 2);
    assert_eq!(result.skipped_devices, 1);
    assert_eq!(result.duplicates_skipped, 1);
    assert_eq!(result.fex_models_fixed, 1);

    let first = &result.devices[0];
    assert_eq!(first.components.len(), 5);
    let fex = first
        .components
        .iter()
        .find(|c| c.entity_id == "50")
        .unwrap();
    assert_eq!(fex.model, "N2K-C2248TP-1GE");

    let second = &result.devices[1];
    assert_eq!(second.hostname, "core-sw-02");
    assert_eq!(second.components.len(), 1);
    assert_eq!(second.summary().chassis_model, "Unknown");
    Ok(())
}

#[tokio::test]
async fn test_reports_written() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;

    let summary = EtlEngine::new(pipeline(&input, &output)).run().await?;
    assert!(summary.starts_with("6 components"), "{}", summary);

    let csv = std::fs::read_to_string(output.path().join(COMPONENTS_REPORT))?;
    assert!(csv.starts_with("hostname,ip,component_type,entity_id,model,serial,description"));
    assert!(csv.contains("core-sw-01,10.0.0.1,transceiver,30,SFP-10G-SR,SFP1"));
    assert!(csv.contains("core-sw-02,10.0.0.2,module,2,N55-M16P,MOD1"));
    assert!(!csv.contains("edge-01"));

    let summaries: Value = serde_json::from_slice(&std::fs::read(output.path().join(SUMMARY_REPORT))?)?;
    assert_eq!(summaries[0]["hostname"], "core-sw-01");
    assert_eq!(summaries[0]["chassis_model"], "N5K-C5596UP");
    assert_eq!(summaries[0]["power_supply_count"], 1);
    assert_eq!(summaries[0]["transceiver_count"], 1);
    assert_eq!(summaries[1]["module_count"], 1);
    Ok(())
}
