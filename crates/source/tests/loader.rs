use serde_json::json;
use std::fs;
use tankobon_source::read_multiple_json_files;

#[tokio::test]
async fn test_merges_shapes_and_survives_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("comics")).unwrap();
    fs::write(
        root.join("comics/01-array.json"),
        json!([{"slug": "a", "coverImage": "public/covers/a.jpg"}]).to_string(),
    )
    .unwrap();
    fs::write(root.join("comics/02-wrapped.json"), json!({"data": [{"slug": "b"}, {"slug": "c"}]}).to_string()).unwrap();
    fs::write(root.join("comics/03-broken.json"), "[{\"slug\": ").unwrap();
    fs::write(root.join("comics/04-single.json"), json!({"slug": "d"}).to_string()).unwrap();

    let patterns = [root.join("comics/*.json"), root.join("comics/02-wrapped.json"), root.join("missing.json")];
    let records = read_multiple_json_files(&patterns).await;

    let slugs: Vec<_> = records.iter().map(|r| r["slug"].as_str().unwrap()).collect();
    assert_eq!(slugs, vec!["a", "b", "c", "d"]);
    assert_eq!(records[0]["coverImage"], "/covers/a.jpg");
}

#[tokio::test]
async fn test_no_patterns_no_records() {
    let patterns: [&str; 0] = [];
    assert!(read_multiple_json_files(&patterns).await.is_empty());
}
