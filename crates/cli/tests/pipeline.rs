use medoid_core::config::{AppConfig, ClusterMode, DatabaseConfig};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_manifest(dir: &Path, assets: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("manifest.json");
    let doc = json!({ "root": dir.to_string_lossy(), "assets": assets });
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    path
}

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: dir.join("ledger.db").to_string_lossy().into_owned(),
        },
        ..AppConfig::default()
    }
}

/// A morning beach shoot (three near-duplicates, two unrelated frames) and an
/// evening frame in another folder, plus one file with no usable time.
fn shoot() -> serde_json::Value {
    json!([
        { "id": "h1", "path": "beach/DSC_A.JPG",
          "timestamps": { "camera_original": "2024:01:01 10:00:00" },
          "tags": ["beach"], "embedding": [1.0, 0.0, 0.0, 0.0] },
        { "id": "h2", "path": "beach/DSC_B.JPG",
          "timestamps": { "camera_original": "2024:01:01 10:01:00" },
          "tags": ["beach"], "embedding": [0.99, 0.05, 0.0, 0.0] },
        { "id": "h3", "path": "beach/DSC_C.JPG",
          "timestamps": { "filesystem": "2024-01-01 10:03:00" },
          "tags": ["Beach"], "embedding": [0.98, 0.0, 0.05, 0.0] },
        { "id": "h4", "path": "beach/DSC_D.JPG",
          "timestamps": { "filesystem": "2024-01-01 10:10:00" },
          "embedding": [0.0, 1.0, 0.0, 0.0] },
        { "id": "h5", "path": "beach/DSC_E.JPG",
          "timestamps": { "filesystem": "2024-01-01 10:20:00" },
          "embedding": [0.0, 0.0, 1.0, 0.0] },
        { "id": "h6", "path": "dinner/DSC_F.JPG",
          "timestamps": { "filesystem": "2024-01-01 19:30:00" },
          "embedding": [0.0, 0.0, 0.0, 1.0] },
        { "id": "h7", "path": "misc/unknown.jpg",
          "embedding": [0.5, 0.5, 0.5, 0.5] }
    ])
}

fn csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn hybrid_run_writes_report_and_records_ledger() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let mut cfg = config(temp.path());
    cfg.cluster.mode = ClusterMode::Hybrid;
    cfg.cluster.min_tag_cluster_size = 3;

    let outcome = cli::cluster::run_cluster(&cfg, &manifest, false).await.unwrap();
    assert!(!outcome.reused);
    let summary = outcome.summary.clone().unwrap();
    assert_eq!(summary.assets, 7);
    assert_eq!(summary.windows, 3);
    assert_eq!(summary.ambiguous_time, 1);

    let rows = &outcome.report.rows;
    let beach: Vec<_> = rows.iter().filter(|r| r.folder == "beach").collect();
    assert_eq!(beach[0].cluster_type.as_str(), "tag");
    assert_eq!(beach[0].cluster_tag, "beach");
    assert_eq!(beach[0].cluster_size, 3);
    assert!(beach[1..].iter().all(|r| r.cluster_type.as_str() == "embedding"));
    for row in rows {
        assert!(row.member_ids.contains(&row.medoid_id));
        assert_eq!(row.cluster_size, row.member_ids.len());
    }

    let out_path = temp.path().join("out").join("medoids.csv");
    cli::cluster::write_report(&outcome.report, Some(&out_path)).unwrap();
    let lines = csv_lines(&out_path);
    assert_eq!(
        lines[0],
        "folder,cluster_type,cluster_tag,label_hint,cluster_size,medoid_rel_path,cosine_to_centroid"
    );
    assert_eq!(lines.len(), rows.len() + 1);
    assert!(lines[1].starts_with("beach,tag,beach,beach,3,beach/DSC_"));

    let pool = storage::connect(&cfg.database.path).await.unwrap();
    let listed = storage::runs::list_runs(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].fingerprint, outcome.fingerprint);
    assert_eq!(listed[0].mode, "hybrid");
}

#[tokio::test]
async fn unchanged_input_reuses_stored_report() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let cfg = config(temp.path());

    let first = cli::cluster::run_cluster(&cfg, &manifest, false).await.unwrap();
    let second = cli::cluster::run_cluster(&cfg, &manifest, false).await.unwrap();
    assert!(second.reused);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.report, second.report);

    let forced = cli::cluster::run_cluster(&cfg, &manifest, true).await.unwrap();
    assert!(!forced.reused);
    assert_eq!(forced.report, first.report);
}

#[tokio::test]
async fn config_change_triggers_fresh_run() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let cfg = config(temp.path());
    let first = cli::cluster::run_cluster(&cfg, &manifest, false).await.unwrap();

    let mut tuned = cfg.clone();
    cli::cluster::Overrides {
        mode: Some("hybrid".to_string()),
        ..Default::default()
    }
    .apply(&mut tuned)
    .unwrap();
    let second = cli::cluster::run_cluster(&tuned, &manifest, false).await.unwrap();
    assert!(!second.reused);
    assert_ne!(first.fingerprint, second.fingerprint);
}

#[tokio::test]
async fn report_csv_is_byte_identical_across_runs() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let mut cfg = config(temp.path());
    cfg.cluster.mode = ClusterMode::Hybrid;

    let a = cli::cluster::run_cluster(&cfg, &manifest, true).await.unwrap();
    let b = cli::cluster::run_cluster(&cfg, &manifest, true).await.unwrap();
    let pa = temp.path().join("a.csv");
    let pb = temp.path().join("b.csv");
    cli::cluster::write_report(&a.report, Some(&pa)).unwrap();
    cli::cluster::write_report(&b.report, Some(&pb)).unwrap();
    assert_eq!(fs::read(pa).unwrap(), fs::read(pb).unwrap());
}

#[tokio::test]
async fn invalid_config_fails_without_touching_ledger() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let mut cfg = config(temp.path());
    cfg.cluster.embedding_threshold = -0.2;

    let err = cli::cluster::run_cluster(&cfg, &manifest, false).await.unwrap_err();
    assert!(err.to_string().contains("embedding_threshold"));
    assert!(!temp.path().join("ledger.db").exists());
}

#[tokio::test]
async fn unknown_mode_override_is_rejected() {
    let mut cfg = AppConfig::default();
    let err = cli::cluster::Overrides {
        mode: Some("kmeans".to_string()),
        ..Default::default()
    }
    .apply(&mut cfg)
    .unwrap_err();
    assert!(err.to_string().contains("kmeans"));
}

#[test]
fn resolve_reports_trust_and_missing_times() {
    let temp = tempdir().unwrap();
    let manifest = write_manifest(temp.path(), shoot());
    let views = cli::resolve::resolve_manifest(&AppConfig::default(), &manifest).unwrap();
    let lost = views.iter().find(|v| v.id == "h7").unwrap();
    assert!(lost.resolved_datetime.is_none());
    assert_eq!(lost.trust_score, 0.0);
    assert!(lost.date_uncertain);

    let first = views.iter().find(|v| v.id == "h1").unwrap();
    assert_eq!(first.resolved_datetime.as_deref(), Some("2024-01-01T10:00:00"));
    assert!(first.signals_used.contains(&"camera_original".to_string()));
}
