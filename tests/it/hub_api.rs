//! Hub data API write verbs (§4.I), driven directly through `dispatch_verb`
//! the way the responder itself does once it has parsed a request body.

use serde_json::json;

use hubd::hub::{Hub, MountTable};
use hubd::responders::hub_api::{dispatch_verb, record_progress};

fn hub_over(files: &[(&str, &str)]) -> (tempfile::TempDir, Hub) {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        std::fs::write(dir.path().join(rel), content).unwrap();
    }
    let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());
    (dir, hub)
}

#[test]
fn reorder_verb_permutes_a_sequence_in_place() {
    let (_dir, hub) = hub_over(&[("list.json", r#"["A","B","C","D","E"]"#)]);

    dispatch_verb(
        &hub,
        &json!({ "verb": "reorder", "target": "/list.json", "order": [2, 0, 4, 1, 3] }),
    )
    .unwrap();

    let result = dispatch_verb(&hub, &json!({ "verb": "fetch", "target": "/list.json" })).unwrap();
    assert_eq!(result["body"], json!(["C", "A", "E", "B", "D"]));
}

#[test]
fn move_verb_relocates_a_value_between_distinct_storage_files() {
    let (_dir, hub) = hub_over(&[
        ("source.json", r#"{"draft": {"title": "hello"}}"#),
        ("dest.json", "{}"),
    ]);

    dispatch_verb(
        &hub,
        &json!({ "verb": "move", "target": "/source.json/draft", "dest": "/dest.json/draft" }),
    )
    .unwrap();

    let source = dispatch_verb(&hub, &json!({ "verb": "fetch", "target": "/source.json" })).unwrap();
    assert!(source["body"].get("draft").is_none());

    let moved_title = dispatch_verb(&hub, &json!({ "verb": "fetch", "target": "/dest.json/draft/title" })).unwrap();
    assert_eq!(moved_title["body"], json!("hello"));
}

#[test]
fn upload_progress_reports_the_recorded_snapshot_and_unknown_otherwise() {
    let (_dir, hub) = hub_over(&[]);
    record_progress("upload-42", 2048, 2048, true);

    let done = dispatch_verb(&hub, &json!({ "verb": "upload_progress", "id": "upload-42" })).unwrap();
    assert_eq!(done["state"], "done");
    assert_eq!(done["received"], 2048);

    let unknown = dispatch_verb(&hub, &json!({ "verb": "upload_progress", "id": "never-seen" })).unwrap();
    assert_eq!(unknown["state"], "unknown");
}
