//! The hub data API (§4.I): a JSON verb-per-request responder mounted at
//! `/api/hub`, giving clients read/write access to the hub tree itself.

pub mod batch;
pub mod fetch;
pub mod mutate;
pub mod xfr;

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

use crate::address::Address;
use crate::error::AppError;
use crate::hub::Hub;
use crate::node::{FileKind, Node};
use crate::request::Request;
use crate::response::Response;

pub struct HubApiResponder;

impl super::Responder for HubApiResponder {
    fn matches(&self, _node: &Node, request: &Request) -> bool {
        request.page.addr.to_canonical().starts_with("/api/hub")
    }

    fn permission_mode(&self) -> &str {
        "rwxvq"
    }

    fn can_post(&self) -> bool {
        true
    }

    fn can_upload(&self) -> bool {
        true
    }

    fn compile(&self, _node: &Node, request: &Request) -> Result<Response, AppError> {
        let hub = request
            .hub
            .as_ref()
            .ok_or_else(|| AppError::Logical("hub API responder requires a hub reference".into()))?;

        let params = params_from_request(request);

        // `upload` alone needs the raw request body, which only `Request`
        // carries (`dispatch_verb`'s params map holds JSON/query args only,
        // for verbs that `batch` can also drive). It returns a bare 204 on
        // success rather than a JSON envelope (§4.I).
        if params["verb"] == "upload" {
            let target = params["target"]
                .as_str()
                .map(Address::parse)
                .ok_or_else(|| AppError::MissingArg("target".into()))?;
            let name = params["name"]
                .as_str()
                .ok_or_else(|| AppError::MissingArg("name".into()))?;
            let replace = params["replace"].as_bool().unwrap_or(false);
            let id = params["id"].as_str().unwrap_or("upload").to_owned();

            xfr::upload(hub, &target, name, &request.raw_body, replace, self.max_post_size(), &id)?;

            let mut response = Response::default();
            response.status = 204;
            response.can_cache = false;
            return Ok(response);
        }

        let value = dispatch_verb(hub, &params)?;

        let mut response = Response::text(value.to_string());
        response.set_header("Content-Type", "application/json");
        response.can_cache = false;
        Ok(response)
    }
}

fn params_from_request(request: &Request) -> JsonValue {
    let verb = request
        .page
        .addr
        .to_canonical()
        .strip_prefix("/api/hub/")
        .unwrap_or("fetch")
        .to_owned();

    // The JSON body (if any) supplies structured arguments like `value` or
    // `order`; the query string only ever carries strings, so it can only
    // override scalar arguments such as `target` or `verb`.
    let mut map = match &request.body_json {
        Some(JsonValue::Object(body)) => body.clone(),
        _ => serde_json::Map::new(),
    };
    map.insert("verb".to_owned(), json!(verb));
    for (key, value) in &request.qs {
        map.insert(key.clone(), json!(value));
    }
    JsonValue::Object(map)
}

/// Routes one verb's parameter map to its implementation. Shared between the
/// top-level responder and `batch`, which invokes this once per sub-item.
pub fn dispatch_verb(hub: &Hub, params: &JsonValue) -> Result<JsonValue, AppError> {
    let verb = params["verb"].as_str().unwrap_or("fetch");
    let target = || -> Result<Address, AppError> {
        params["target"]
            .as_str()
            .map(Address::parse)
            .ok_or_else(|| AppError::MissingArg("target".into()))
    };

    match verb {
        "fetch" => {
            let target = target()?;
            match params.get("branch") {
                Some(root) if root.as_str().is_some() => {
                    fetch::fetch_branch(hub, &Address::parse(root.as_str().unwrap()), &target)
                }
                _ => fetch::fetch(hub, &target),
            }
        }
        "store" => mutate::store(hub, &target()?, params["value"].clone()),
        "update" => mutate::update(hub, &target()?, &params["values"]),
        "insert" => mutate::insert(hub, &target()?, params["value"].clone()),
        "remove" => mutate::remove(hub, &target()?),
        "rename" => {
            let new_name = params["name"]
                .as_str()
                .ok_or_else(|| AppError::MissingArg("name".into()))?;
            mutate::rename(hub, &target()?, new_name)
        }
        "reorder" => {
            let order: Vec<usize> = params["order"]
                .as_array()
                .ok_or_else(|| AppError::MissingArg("order".into()))?
                .iter()
                .map(|v| v.as_u64().unwrap_or(0) as usize)
                .collect();
            mutate::reorder(hub, &target()?, order)
        }
        "create" => {
            let kind = match params["kind"].as_str().unwrap_or("text") {
                "hash" => FileKind::HashFile,
                "json" => FileKind::JsonFile,
                "binary" => FileKind::BinaryFile,
                "code" => FileKind::CodeFile,
                _ => FileKind::TextFile,
            };
            mutate::create(hub, &target()?, kind)
        }
        "copy" => {
            let dest = params["dest"]
                .as_str()
                .map(Address::parse)
                .ok_or_else(|| AppError::MissingArg("dest".into()))?;
            mutate::copy(hub, &target()?, &dest)
        }
        "move" => {
            let dest = params["dest"]
                .as_str()
                .map(Address::parse)
                .ok_or_else(|| AppError::MissingArg("dest".into()))?;
            mutate::mv(hub, &target()?, &dest)
        }
        "download" => {
            let name = params["name"]
                .as_str()
                .ok_or_else(|| AppError::MissingArg("name".into()))?;
            let uri = params["uri"]
                .as_str()
                .ok_or_else(|| AppError::MissingArg("uri".into()))?;
            // Unlike `upload`, `download` has no raw body, so it never needs
            // `compile()`'s special-casing and can run through `batch` like
            // any other verb; `max_post_size` is read from params rather
            // than a `Responder`, since this function has no responder in
            // scope.
            let max_size = params["max_post_size"].as_u64().unwrap_or(0);
            let id = params["id"].as_str().unwrap_or("download");
            xfr::download(hub, &target()?, name, uri, max_size, id)
        }
        "batch" => {
            let items = params["items"].as_array().cloned().unwrap_or_default();
            Ok(batch::batch(hub, &items))
        }
        "upload_progress" | "download_progress" => {
            let id = params["id"]
                .as_str()
                .ok_or_else(|| AppError::MissingArg("X-Progress-ID".into()))?;
            Ok(progress_snapshot(id))
        }
        other => Err(AppError::Logical(format!("unknown hub API verb: {other}"))),
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct ProgressState {
    pub size: u64,
    pub received: u64,
    #[serde(rename = "state")]
    pub phase: &'static str,
}

static PROGRESS: Lazy<Mutex<HashMap<String, ProgressState>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Records one progress snapshot for an in-flight `upload` or `download`
/// (§4.J "input_filter"), read back by `upload_progress`/`download_progress`.
pub fn record_progress(id: &str, size: u64, received: u64, done: bool) {
    PROGRESS.lock().unwrap().insert(
        id.to_owned(),
        ProgressState {
            size,
            received,
            phase: if done { "done" } else { "uploading" },
        },
    );
}

fn progress_snapshot(id: &str) -> JsonValue {
    match PROGRESS.lock().unwrap().get(id) {
        Some(state) => json!(state),
        None => json!({ "size": 0, "received": 0, "state": "unknown" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MountTable;

    #[test]
    fn dispatch_fetch_verb() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let result = dispatch_verb(&hub, &json!({ "verb": "fetch", "target": "/a.txt" })).unwrap();
        assert!(result["head"]["meta"]["content"] == "hi");
    }

    #[test]
    fn progress_reports_recorded_state() {
        record_progress("xyz", 10_485_760, 1024, false);
        let snapshot = progress_snapshot("xyz");
        assert_eq!(snapshot["state"], "uploading");
        assert_eq!(snapshot["received"], 1024);
    }
}
