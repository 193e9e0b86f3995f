mod common;

use std::io::Write;
use std::path::Path;

use serde_json::json;

use aria2_orchestrator::TaskError;
use aria2_orchestrator::downloader::batch::{Resource, load_resources, submit_batch};
use aria2_orchestrator::rpc::aria2::ADD_URI;
use common::ScriptedDaemon;

fn resource(title: &str, url: &str, category: &str) -> Resource {
    Resource {
        title: title.to_string(),
        download_url: url.to_string(),
        category: category.to_string(),
        file_name: None,
    }
}

#[tokio::test]
async fn test_load_resources_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!([
            { "title": "Forest Tiles", "download_url": "http://x/forest.zip", "category": "tilesets" },
            { "title": "Hero Sprites", "download_url": "http://x/hero.zip", "category": "characters", "source": "opengameart" }
        ])
    )
    .unwrap();

    let resources = load_resources(file.path()).await.unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[1].category, "characters");
}

#[tokio::test]
async fn test_load_resources_missing_file_fails() {
    assert!(load_resources("/definitely/not/here.json").await.is_err());
}

#[tokio::test]
async fn test_batch_reports_each_resource() {
    let daemon = ScriptedDaemon::online();
    let orchestrator = daemon.orchestrator();

    let resources = vec![
        resource("Forest Tiles!", "http://x/forest.zip", "tilesets"),
        resource("Broken", "::not-a-url::", "misc"),
        resource("Hero Sprites", "http://x/hero.zip", "characters"),
    ];

    let report = submit_batch(&orchestrator, resources, Path::new("/assets"), 2)
        .await
        .unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].resource.title, "Broken");
    assert!(matches!(report.failed[0].error, TaskError::InvalidUrl(_)));
    assert_eq!(orchestrator.tasks().await.len(), 2);

    let calls = daemon.calls_to(ADD_URI);
    let forest = calls
        .iter()
        .find(|p| p[0] == json!(["http://x/forest.zip"]))
        .expect("forest submitted");
    assert_eq!(forest[1]["out"], "Forest Tiles.zip");
    assert_eq!(
        forest[1]["dir"],
        json!(Path::new("/assets").join("tilesets").to_string_lossy())
    );
    assert_eq!(forest[1]["split"], "16");
}

#[tokio::test]
async fn test_batch_requires_reachable_daemon() {
    let daemon = ScriptedDaemon::offline();
    let orchestrator = daemon.orchestrator();

    let err = submit_batch(
        &orchestrator,
        vec![resource("A", "http://x/a.zip", "misc")],
        Path::new("/assets"),
        4,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, TaskError::NotConnected(_)));
    assert!(daemon.calls_to(ADD_URI).is_empty());
}
