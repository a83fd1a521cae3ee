//! `batch` (§4.I): executes a list of sub-request parameter maps
//! sequentially within the same request, accumulating results. Per-item
//! failures are attached to that item rather than failing the envelope.

use serde_json::{json, Value as JsonValue};

use crate::hub::Hub;

use super::dispatch_verb;

pub fn batch(hub: &Hub, items: &[JsonValue]) -> JsonValue {
    let results: Vec<JsonValue> = items
        .iter()
        .map(|item| match dispatch_verb(hub, item) {
            Ok(value) => value,
            Err(err) => json!({ "error": { "type": format!("{err:?}"), "message": err.to_string() } }),
        })
        .collect();

    json!({ "result": results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MountTable;

    #[test]
    fn batch_runs_each_item_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"a":1}"#).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let items = vec![
            json!({ "verb": "fetch", "target": "/data.json/a" }),
            json!({ "verb": "fetch", "target": "/missing" }),
        ];
        let result = batch(&hub, &items);
        let result = result["result"].as_array().unwrap();
        assert!(result[0].get("head").is_some());
        assert!(result[1].get("error").is_some());
    }
}
