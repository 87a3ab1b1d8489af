//! # Volume Manager REST Client
//!
//! `VolumeBackend` implementation that delegates CNS attach/detach to the
//! volume manager service over HTTP/JSON.
//!
//! Endpoints:
//! - `GET  /v1/datacenters/{dc}/vms/{uuid}` - find a node VM by BIOS UUID
//! - `POST /v1/vms/{moref}/volumes/attach` - attach a CNS volume, returns the disk UUID
//! - `POST /v1/vms/{moref}/volumes/detach` - detach a CNS volume
//!
//! Failures carry a `{"fault": "...", "message": "..."}` body which is mapped
//! onto [`FaultKind`]. Connection failures are reported as `vcenter-not-found`.

mod requests;
mod responses;

pub use requests::*;
pub use responses::*;

use crate::backend::{BackendError, FaultKind, NodeVm, VolumeBackend};
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, Instrument};

/// Per-call timeout for volume manager requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Volume manager REST client
pub struct RestVolumeBackend {
    http_client: Client,
    base_url: String,
    vcenter_host: String,
    datacenters: Vec<String>,
}

impl std::fmt::Debug for RestVolumeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestVolumeBackend")
            .field("base_url", &self.base_url)
            .field("vcenter_host", &self.vcenter_host)
            .field("datacenters", &self.datacenters)
            .finish_non_exhaustive()
    }
}

impl RestVolumeBackend {
    /// Create a new volume manager client
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, vcenter_host: &str, datacenters: Vec<String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "Initializing volume manager client: endpoint={}, vcenter={}, datacenters={:?}",
            base_url, vcenter_host, datacenters
        );

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            vcenter_host: vcenter_host.to_string(),
            datacenters,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(self.url(path))
            .header("x-vcenter-host", &self.vcenter_host)
    }

    fn post(&self, path: &str, body: &VolumeRequest) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.url(path))
            .header("x-vcenter-host", &self.vcenter_host)
            .header("content-type", "application/json")
            .json(body)
    }

    /// Send a request, mapping transport failures onto fault kinds
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        request.send().await.map_err(|e| {
            if e.is_connect() {
                BackendError::new(
                    FaultKind::VcenterNotFound,
                    format!("failed to connect to VC {}: {e}", self.vcenter_host),
                )
            } else {
                BackendError::new(FaultKind::Internal, format!("volume manager request failed: {e}"))
            }
        })
    }
}

/// Turn a non-success response into a classified error
async fn error_from_response(response: reqwest::Response, operation: &str) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_error_body(status, &body, operation)
}

fn classify_error_body(status: StatusCode, body: &str, operation: &str) -> BackendError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let fault = parsed.fault.as_deref().map_or(FaultKind::Internal, FaultKind::from_wire);
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("{operation} failed with status {status}: {body}"));
    BackendError::new(fault, message)
}

#[async_trait]
impl VolumeBackend for RestVolumeBackend {
    async fn find_vm(&self, node_uuid: &str) -> Result<NodeVm, BackendError> {
        let span = info_span!("volume_manager.find_vm", vm.uuid = node_uuid);
        async move {
            if self.datacenters.is_empty() {
                return Err(BackendError::new(
                    FaultKind::DatacenterNotFound,
                    "unable to get vCenter datacenters from vsphere config",
                ));
            }

            for datacenter in &self.datacenters {
                let response = self
                    .send(self.get(&format!("datacenters/{datacenter}/vms/{node_uuid}")))
                    .await?;

                match response.status() {
                    status if status.is_success() => {
                        let vm: VmResponse = response.json().await.map_err(|e| {
                            BackendError::new(
                                FaultKind::Internal,
                                format!("failed to parse VM lookup response: {e}"),
                            )
                        })?;
                        debug!("Found VM {} ({}) in datacenter {}", node_uuid, vm.moref, datacenter);
                        return Ok(NodeVm {
                            uuid: node_uuid.to_string(),
                            moref: vm.moref,
                            datacenter: datacenter.clone(),
                            vcenter_host: self.vcenter_host.clone(),
                        });
                    }
                    StatusCode::NOT_FOUND => {
                        debug!("VM {} not found in datacenter {}", node_uuid, datacenter);
                    }
                    _ => {
                        let err = error_from_response(response, "find VM").await;
                        return Err(BackendError::new(
                            if err.fault == FaultKind::Internal {
                                FaultKind::FindVmByUuid
                            } else {
                                err.fault
                            },
                            err.message,
                        ));
                    }
                }
            }

            Err(BackendError::new(
                FaultKind::VmNotFound,
                format!("virtual machine with UUID {node_uuid} not found"),
            ))
        }
        .instrument(span)
        .await
    }

    async fn attach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<String, BackendError> {
        let span = info_span!("volume_manager.attach", vm.moref = %vm.moref, volume.id = volume_id);
        async move {
            let start = Instant::now();
            let body = VolumeRequest::new(volume_id, &vm.datacenter);
            let response = self
                .send(self.post(&format!("vms/{}/volumes/attach", vm.moref), &body))
                .await?;

            if !response.status().is_success() {
                metrics::record_backend_operation("attach", false, start.elapsed().as_secs_f64());
                return Err(error_from_response(response, "attach volume").await);
            }

            let attached: AttachResponse = response.json().await.map_err(|e| {
                BackendError::new(
                    FaultKind::Internal,
                    format!("failed to parse attach response: {e}"),
                )
            })?;
            metrics::record_backend_operation("attach", true, start.elapsed().as_secs_f64());
            Ok(attached.disk_uuid)
        }
        .instrument(span)
        .await
    }

    async fn detach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<(), BackendError> {
        let span = info_span!("volume_manager.detach", vm.moref = %vm.moref, volume.id = volume_id);
        async move {
            let start = Instant::now();
            let body = VolumeRequest::new(volume_id, &vm.datacenter);
            let response = self
                .send(self.post(&format!("vms/{}/volumes/detach", vm.moref), &body))
                .await?;

            if !response.status().is_success() {
                metrics::record_backend_operation("detach", false, start.elapsed().as_secs_f64());
                return Err(error_from_response(response, "detach volume").await);
            }

            metrics::record_backend_operation("detach", true, start.elapsed().as_secs_f64());
            Ok(())
        }
        .instrument(span)
        .await
    }
}
