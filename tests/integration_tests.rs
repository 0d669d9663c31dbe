use anyhow::Result;
use clap::Parser;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use nomis_backfill::{
    run_backfill, save_report, BackfillEngine, BackfillError, CliConfig, FixedIntervalPacer,
    LocalStorage, NomisClient, NomisSettings, PostgrestStore, RunPhase, StoreSettings,
};
use std::time::Duration;
use tempfile::TempDir;

const TABLE_PATH: &str = "/rest/v1/demographic_feedback";
const NOMIS_PATH: &str = "/dataset/NM_2072_1.data.json";

fn engine_for(
    store_server: &MockServer,
    nomis_server: &MockServer,
) -> BackfillEngine<PostgrestStore, NomisClient, FixedIntervalPacer> {
    let store = PostgrestStore::new(StoreSettings::new(store_server.base_url(), "test-key")).unwrap();
    let source = NomisClient::new(NomisSettings {
        base_url: nomis_server.base_url(),
        timeout: Duration::from_secs(5),
        ..NomisSettings::default()
    })
    .unwrap();
    BackfillEngine::new(store, source, FixedIntervalPacer::new(10, Duration::ZERO))
}

fn mock_counts(server: &MockServer, total: u64, enriched: u64) {
    // Registered first so the unfiltered count does not shadow it.
    server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("select", "id")
            .query_param("owner_occupied_pct", "not.is.null");
        then.status(206)
            .header("Content-Range", format!("0-0/{}", enriched))
            .json_body(serde_json::json!([]));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("select", "id")
            .header("Prefer", "count=exact");
        then.status(206)
            .header("Content-Range", format!("0-0/{}", total))
            .json_body(serde_json::json!([]));
    });
}

#[tokio::test]
async fn test_end_to_end_backfill_over_http() -> Result<()> {
    let store_server = MockServer::start();
    let nomis_server = MockServer::start();

    let fetch_mock = store_server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("select", "id,oa21_code")
            .query_param("owner_occupied_pct", "is.null")
            .query_param("oa21_code", "not.is.null");
        then.status(200).json_body(serde_json::json!([
            {"id": "row-1", "oa21_code": "E00000001"},
            {"id": "row-2", "oa21_code": "E00000002"},
            {"id": "row-3", "oa21_code": "E00000003"}
        ]));
    });
    mock_counts(&store_server, 10, 8);

    let update_ok = store_server.mock(|when, then| {
        when.method(PATCH)
            .path(TABLE_PATH)
            .query_param("id", "eq.row-2")
            .json_body(serde_json::json!({"owner_occupied_pct": 62.5}));
        then.status(200).json_body(serde_json::json!([{"id": "row-2"}]));
    });
    let update_failed = store_server.mock(|when, then| {
        when.method(PATCH)
            .path(TABLE_PATH)
            .query_param("id", "eq.row-3");
        then.status(500).body("database is read-only");
    });

    let no_data = nomis_server.mock(|when, then| {
        when.method(GET)
            .path(NOMIS_PATH)
            .query_param("geography", "E00000001");
        then.status(200).json_body(serde_json::json!({"obs": []}));
    });
    let has_data = nomis_server.mock(|when, then| {
        when.method(GET)
            .path(NOMIS_PATH)
            .query_param("geography", "E00000002");
        then.status(200)
            .json_body(serde_json::json!({"obs": [{"obs_value": {"value": 62.5}}]}));
    });
    nomis_server.mock(|when, then| {
        when.method(GET)
            .path(NOMIS_PATH)
            .query_param("geography", "E00000003");
        then.status(200)
            .json_body(serde_json::json!({"obs": [{"obs_value": {"value": 17.25}}]}));
    });

    let mut engine = engine_for(&store_server, &nomis_server);
    let stats = engine.run().await?;

    fetch_mock.assert();
    no_data.assert();
    has_data.assert();
    update_ok.assert_hits(1);
    update_failed.assert_hits(1);

    assert_eq!(engine.phase(), RunPhase::Done);
    assert_eq!(stats.total_candidates, 3);
    assert_eq!(stats.enriched_count, 1);
    assert_eq!(stats.skipped_count, 1);
    assert_eq!(stats.failed_count, 1);
    assert!(stats.is_complete());
    assert_eq!(stats.store_total_rows, Some(10));
    assert_eq!(stats.store_enriched_rows, Some(8));
    Ok(())
}

#[tokio::test]
async fn test_update_matching_no_row_counts_as_failed() -> Result<()> {
    let store_server = MockServer::start();
    let nomis_server = MockServer::start();

    store_server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("owner_occupied_pct", "is.null");
        then.status(200).json_body(serde_json::json!([
            {"id": "hidden-by-rls", "oa21_code": "E00000002"}
        ]));
    });
    let update_mock = store_server.mock(|when, then| {
        when.method(PATCH)
            .path(TABLE_PATH)
            .query_param("id", "eq.hidden-by-rls");
        then.status(200).json_body(serde_json::json!([]));
    });
    mock_counts(&store_server, 1, 0);
    nomis_server.mock(|when, then| {
        when.method(GET).path(NOMIS_PATH);
        then.status(200)
            .json_body(serde_json::json!({"obs": [{"obs_value": {"value": 62.5}}]}));
    });

    let stats = engine_for(&store_server, &nomis_server).run().await?;

    update_mock.assert_hits(1);
    assert_eq!(stats.enriched_count, 0);
    assert_eq!(stats.failed_count, 1);
    assert!(stats.is_complete());
    Ok(())
}

#[tokio::test]
async fn test_unreadable_store_aborts_without_lookups() {
    let store_server = MockServer::start();
    let nomis_server = MockServer::start();

    store_server.mock(|when, then| {
        when.method(GET).path(TABLE_PATH);
        then.status(401)
            .json_body(serde_json::json!({"message": "Invalid API key"}));
    });
    let nomis_mock = nomis_server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(serde_json::json!({"obs": []}));
    });

    let mut engine = engine_for(&store_server, &nomis_server);
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, BackfillError::StoreReadError { .. }));
    assert_ne!(err.exit_code(), 0);
    assert_eq!(engine.phase(), RunPhase::Aborted);
    nomis_mock.assert_hits(0);
}

#[tokio::test]
async fn test_empty_candidate_set_still_reports() -> Result<()> {
    let store_server = MockServer::start();
    let nomis_server = MockServer::start();

    store_server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("owner_occupied_pct", "is.null");
        then.status(200).json_body(serde_json::json!([]));
    });
    mock_counts(&store_server, 4, 4);
    let nomis_mock = nomis_server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(serde_json::json!({"obs": []}));
    });

    let stats = engine_for(&store_server, &nomis_server).run().await?;

    assert_eq!(stats.total_candidates, 0);
    assert_eq!(stats.enriched_count, 0);
    assert_eq!(stats.skipped_count, 0);
    assert_eq!(stats.failed_count, 0);
    assert_eq!(stats.store_total_rows, Some(4));
    assert_eq!(stats.store_enriched_rows, Some(4));
    nomis_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_report_is_written_as_json() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store_server = MockServer::start();
    let nomis_server = MockServer::start();

    store_server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("owner_occupied_pct", "is.null");
        then.status(200).json_body(serde_json::json!([
            {"id": 41, "oa21_code": "E00000002"}
        ]));
    });
    store_server.mock(|when, then| {
        when.method(PATCH)
            .path(TABLE_PATH)
            .query_param("id", "eq.41");
        then.status(200).json_body(serde_json::json!([{"id": 41}]));
    });
    // No count mocks: the snapshot is unavailable but the run still succeeds.
    nomis_server.mock(|when, then| {
        when.method(GET).path(NOMIS_PATH);
        then.status(200)
            .json_body(serde_json::json!({"obs": [{"obs_value": {"value": "62.5"}}]}));
    });

    let stats = engine_for(&store_server, &nomis_server).run().await?;
    let storage = LocalStorage::new(temp_dir.path());
    save_report(&storage, "reports/backfill.json", &stats).await?;

    let written = std::fs::read_to_string(temp_dir.path().join("reports/backfill.json"))?;
    let report: serde_json::Value = serde_json::from_str(&written)?;

    assert_eq!(report["total_candidates"], 1);
    assert_eq!(report["enriched_count"], 1);
    assert_eq!(report["dry_run"], false);
    assert!(report["store_total_rows"].is_null());
    assert!(report["started_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_unwritable_report_does_not_fail_the_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory")?;
    let report_path = blocker.join("report.json");

    let store_server = MockServer::start();
    let nomis_server = MockServer::start();
    store_server.mock(|when, then| {
        when.method(GET)
            .path(TABLE_PATH)
            .query_param("owner_occupied_pct", "is.null");
        then.status(200).json_body(serde_json::json!([]));
    });
    mock_counts(&store_server, 2, 2);

    let config = CliConfig::try_parse_from([
        "nomis-backfill".to_string(),
        "--supabase-url".to_string(),
        store_server.base_url(),
        "--supabase-key".to_string(),
        "test-key".to_string(),
        "--nomis-base-url".to_string(),
        nomis_server.base_url(),
        "--report-path".to_string(),
        report_path.to_string_lossy().into_owned(),
    ])?;

    let stats = run_backfill(&config).await?;

    assert_eq!(stats.total_candidates, 0);
    assert_eq!(stats.store_total_rows, Some(2));
    assert!(!report_path.exists());
    Ok(())
}
