//! KubeStore tests against a minimal fake API server
//!
//! The attachment record is written in two calls (status subresource, then
//! metadata). These tests pin down their order and what each one carries.

mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, put};
use axum::{Json, Router};
use cns_attachment_controller::constants::{ATTRIBUTE_CNS_VOLUME_ID, CNS_FINALIZER};
use cns_attachment_controller::controller::store::{KubeStore, ResourceStore};
use cns_attachment_controller::crd::{CnsNodeVmAttachment, CnsNodeVmAttachmentStatus};
use common::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const ATTACHMENT_PATH: &str = "/apis/cns.vmware.com/v1alpha1/namespaces/test-ns/cnsnodevmattachments/att-1";

#[derive(Clone, Default)]
struct ApiServer {
    requests: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    fail_status: bool,
}

impl ApiServer {
    fn record(&self, call: &str, body: &str) {
        let body = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
        self.requests.lock().unwrap().push((call.to_string(), body));
    }

    fn calls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    fn body(&self, call: &str) -> serde_json::Value {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c == call)
            .map(|(_, b)| b.clone())
            .expect("request recorded")
    }
}

fn stored(resource_version: &str) -> CnsNodeVmAttachment {
    let mut att = pending_write();
    att.metadata.resource_version = Some(resource_version.to_string());
    att
}

/// att-1 at resourceVersion 1 with our finalizer and volume ID added locally
fn pending_write() -> CnsNodeVmAttachment {
    let mut att = attachment("att-1", "node-A", "pvc-1");
    att.metadata.resource_version = Some("1".to_string());
    att.metadata.finalizers = Some(vec![CNS_FINALIZER.to_string()]);
    att.status = Some(CnsNodeVmAttachmentStatus {
        attached: false,
        attachment_metadata: BTreeMap::from([(ATTRIBUTE_CNS_VOLUME_ID.to_string(), "vol-123".to_string())]),
        error: String::new(),
    });
    att
}

async fn patch_status(State(server): State<ApiServer>, body: String) -> Response {
    server.record("patch-status", &body);
    if server.fail_status {
        let status = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "etcdserver: request timed out",
            "reason": "InternalError",
            "code": 500
        });
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(status)).into_response();
    }
    Json(stored("2")).into_response()
}

async fn replace(State(server): State<ApiServer>, body: String) -> Response {
    server.record("replace", &body);
    Json(stored("3")).into_response()
}

async fn start(server: ApiServer) -> KubeStore {
    init_rustls();
    let app = Router::new()
        .route(&format!("{ATTACHMENT_PATH}/status"), patch(patch_status))
        .route(ATTACHMENT_PATH, put(replace))
        .with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = kube::Config::new(format!("http://{addr}").parse().unwrap());
    KubeStore::new(kube::Client::try_from(config).unwrap())
}

#[tokio::test]
async fn test_attachment_status_written_before_finalizers() {
    let server = ApiServer::default();
    let store = start(server.clone()).await;

    let updated = store.replace(&pending_write()).await.unwrap();

    assert_eq!(server.calls(), vec!["patch-status", "replace"]);
    assert_eq!(server.body("patch-status")["metadata"]["resourceVersion"], "1");
    assert_eq!(server.body("patch-status")["status"]["metadata"][ATTRIBUTE_CNS_VOLUME_ID], "vol-123");
    assert_eq!(server.body("replace")["metadata"]["resourceVersion"], "2");
    assert_eq!(updated.metadata.resource_version.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_failed_status_write_leaves_finalizers_unwritten() {
    let server = ApiServer {
        fail_status: true,
        ..ApiServer::default()
    };
    let store = start(server.clone()).await;

    let err = store.replace(&pending_write()).await.unwrap_err();

    assert!(!err.is_conflict());
    assert_eq!(server.calls(), vec!["patch-status"]);
}
