//! Common test utilities
//!
//! Shared rustls setup for contract tests and in-memory fakes for every seam the
//! reconciler talks through, so attach/detach passes can run without a cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use cns_attachment_controller::backend::{BackendError, FaultKind, NodeVm, VolumeBackend};
use cns_attachment_controller::controller::backoff::BackoffRegistry;
use cns_attachment_controller::controller::events::{EventSeverity, EventSink};
use cns_attachment_controller::controller::finalizer::{AttachmentFinalizers, ClaimFinalizers};
use cns_attachment_controller::controller::reconciler::{reconcile_attachment, PassOutcome, Reconciler};
use cns_attachment_controller::controller::store::{
    ResolveError, ResourceStore, StoreError, VmInventory, VmRecord, VolumeIdResolver,
};
use cns_attachment_controller::crd::{CnsNodeVmAttachment, CnsNodeVmAttachmentSpec};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it is only installed once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "test-ns";

pub fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

pub fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).expect("valid timestamp")
}

pub fn attachment(name: &str, node_uuid: &str, claim: &str) -> CnsNodeVmAttachment {
    let mut att = CnsNodeVmAttachment::new(
        name,
        CnsNodeVmAttachmentSpec {
            node_uuid: node_uuid.to_string(),
            volume_name: claim.to_string(),
        },
    );
    att.metadata.namespace = Some(NAMESPACE.to_string());
    att
}

pub fn claim(name: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            finalizers: Some(vec!["kubernetes.io/pvc-protection".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn node_vm(uuid: &str) -> NodeVm {
    NodeVm {
        uuid: uuid.to_string(),
        moref: format!("vm-{uuid}"),
        datacenter: "dc-1".to_string(),
        vcenter_host: "vc.example.com".to_string(),
    }
}

type Mutation<K> = Box<dyn FnOnce(&mut K) + Send>;

/// API-server-like store: bumps resourceVersion on every write, rejects stale
/// writes with a conflict and deletes a terminating object once its last
/// finalizer is gone
pub struct InMemoryStore<K> {
    objects: Mutex<HashMap<String, K>>,
    next_version: AtomicU64,
    replaces: AtomicUsize,
    failing_replaces: AtomicUsize,
    failing_gets: AtomicUsize,
    concurrent_writes: Mutex<Vec<Mutation<K>>>,
}

impl<K> Default for InMemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            replaces: AtomicUsize::new(0),
            failing_replaces: AtomicUsize::new(0),
            failing_gets: AtomicUsize::new(0),
            concurrent_writes: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Resource + Clone + Send + Sync + 'static> InMemoryStore<K> {
    fn bump(&self, obj: &mut K) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    fn object_key(obj: &K) -> String {
        key(
            obj.meta().namespace.as_deref().unwrap_or_default(),
            obj.meta().name.as_deref().unwrap_or_default(),
        )
    }

    pub fn insert(&self, mut obj: K) -> K {
        self.bump(&mut obj);
        self.objects
            .lock()
            .unwrap()
            .insert(Self::object_key(&obj), obj.clone());
        obj
    }

    pub fn snapshot(&self, name: &str) -> Option<K> {
        self.objects.lock().unwrap().get(&key(NAMESPACE, name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot(name).is_some()
    }

    /// Mutate the stored object as another writer would
    pub fn mutate(&self, name: &str, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects.get_mut(&key(NAMESPACE, name)).expect("object exists");
        f(obj);
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    /// Run `f` against the stored object right before the next replace lands,
    /// so the replace carries a stale resourceVersion
    pub fn on_next_replace(&self, f: impl FnOnce(&mut K) + Send + 'static) {
        self.concurrent_writes.lock().unwrap().push(Box::new(f));
    }

    pub fn fail_next_replaces(&self, n: usize) {
        self.failing_replaces.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    pub fn replace_count(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl<K: Resource + Clone + Send + Sync + 'static> ResourceStore<K> for InMemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        if take_one(&self.failing_gets) {
            return Err(StoreError::Other("injected read failure".to_string()));
        }
        Ok(self.objects.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn replace(&self, resource: &K) -> Result<K, StoreError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_replaces) {
            return Err(StoreError::Other("injected write failure".to_string()));
        }

        let object_key = Self::object_key(resource);
        let pending: Vec<Mutation<K>> = self.concurrent_writes.lock().unwrap().drain(..).collect();
        let mut objects = self.objects.lock().unwrap();

        if let Some(stored) = objects.get_mut(&object_key) {
            for mutation in pending {
                mutation(stored);
                let version = self.next_version.fetch_add(1, Ordering::SeqCst);
                stored.meta_mut().resource_version = Some(version.to_string());
            }
        }

        let stored = objects
            .get(&object_key)
            .ok_or_else(|| StoreError::NotFound(object_key.clone()))?;
        if stored.meta().resource_version != resource.meta().resource_version {
            return Err(StoreError::Conflict(object_key));
        }

        let mut updated = resource.clone();
        // deletionTimestamp is owned by the store, never by the writer
        updated.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        updated.meta_mut().resource_version = Some(version.to_string());

        let released = updated.meta().deletion_timestamp.is_some()
            && updated.meta().finalizers.as_ref().is_none_or(Vec::is_empty);
        if released {
            objects.remove(&object_key);
        } else {
            objects.insert(object_key, updated.clone());
        }
        Ok(updated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    FindVm(String),
    Attach { vm: String, volume_id: String },
    Detach { vm: String, volume_id: String },
}

/// Volume backend double with attach state per VM
#[derive(Default)]
pub struct FakeBackend {
    vms: Mutex<HashMap<String, NodeVm>>,
    disks: Mutex<HashMap<String, String>>,
    attached: Mutex<Vec<(String, String)>>,
    find_error: Mutex<Option<BackendError>>,
    attach_errors: Mutex<Vec<BackendError>>,
    detach_errors: Mutex<Vec<BackendError>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl FakeBackend {
    pub fn with_vm(self, uuid: &str) -> Self {
        self.vms.lock().unwrap().insert(uuid.to_string(), node_vm(uuid));
        self
    }

    pub fn with_disk(self, volume_id: &str, disk_uuid: &str) -> Self {
        self.disks
            .lock()
            .unwrap()
            .insert(volume_id.to_string(), disk_uuid.to_string());
        self
    }

    pub fn remove_vm(&self, uuid: &str) {
        self.vms.lock().unwrap().remove(uuid);
    }

    pub fn fail_find(&self, err: BackendError) {
        *self.find_error.lock().unwrap() = Some(err);
    }

    /// Queue errors for the next attach calls, one per call
    pub fn fail_attach(&self, errors: Vec<BackendError>) {
        *self.attach_errors.lock().unwrap() = errors;
    }

    pub fn fail_detach(&self, errors: Vec<BackendError>) {
        *self.detach_errors.lock().unwrap() = errors;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attach_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Attach { .. }))
            .count()
    }

    pub fn detach_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Detach { .. }))
            .count()
    }

    pub fn is_attached(&self, uuid: &str, volume_id: &str) -> bool {
        self.attached
            .lock()
            .unwrap()
            .contains(&(uuid.to_string(), volume_id.to_string()))
    }
}

fn pop_front<T>(queue: &Mutex<Vec<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

#[async_trait]
impl VolumeBackend for FakeBackend {
    async fn find_vm(&self, node_uuid: &str) -> Result<NodeVm, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::FindVm(node_uuid.to_string()));
        if let Some(err) = self.find_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.vms.lock().unwrap().get(node_uuid).cloned().ok_or_else(|| {
            BackendError::new(
                FaultKind::VmNotFound,
                format!("virtual machine with UUID {node_uuid} not found"),
            )
        })
    }

    async fn attach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<String, BackendError> {
        self.calls.lock().unwrap().push(BackendCall::Attach {
            vm: vm.uuid.clone(),
            volume_id: volume_id.to_string(),
        });
        if let Some(err) = pop_front(&self.attach_errors) {
            return Err(err);
        }
        let disk = self
            .disks
            .lock()
            .unwrap()
            .get(volume_id)
            .cloned()
            .unwrap_or_else(|| format!("disk-for-{volume_id}"));
        let mut attached = self.attached.lock().unwrap();
        let entry = (vm.uuid.clone(), volume_id.to_string());
        if !attached.contains(&entry) {
            attached.push(entry);
        }
        Ok(disk)
    }

    async fn detach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(BackendCall::Detach {
            vm: vm.uuid.clone(),
            volume_id: volume_id.to_string(),
        });
        if let Some(err) = pop_front(&self.detach_errors) {
            return Err(err);
        }
        self.attached
            .lock()
            .unwrap()
            .retain(|(uuid, volume)| !(uuid == &vm.uuid && volume == volume_id));
        Ok(())
    }
}

/// Claim name to volume ID table
#[derive(Default)]
pub struct FakeVolumeIdResolver {
    volumes: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl FakeVolumeIdResolver {
    pub fn bind(&self, claim: &str, volume_id: &str) {
        self.volumes
            .lock()
            .unwrap()
            .insert(key(NAMESPACE, claim), volume_id.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VolumeIdResolver for FakeVolumeIdResolver {
    async fn resolve_volume_id(&self, namespace: &str, claim: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.volumes
            .lock()
            .unwrap()
            .get(&key(namespace, claim))
            .cloned()
            .ok_or_else(|| ResolveError::Unbound {
                namespace: namespace.to_string(),
                claim: claim.to_string(),
                waited_secs: 0,
            })
    }
}

/// VirtualMachine inventory keyed by BIOS UUID
#[derive(Default)]
pub struct FakeVmInventory {
    vms: Mutex<HashMap<String, VmRecord>>,
    failing: AtomicUsize,
}

impl FakeVmInventory {
    pub fn add(&self, bios_uuid: &str, name: &str, being_deleted: bool) {
        self.vms.lock().unwrap().insert(
            key(NAMESPACE, bios_uuid),
            VmRecord {
                name: name.to_string(),
                being_deleted,
            },
        );
    }

    pub fn fail_next(&self, n: usize) {
        self.failing.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl VmInventory for FakeVmInventory {
    async fn find_by_bios_uuid(
        &self,
        namespace: &str,
        bios_uuid: &str,
    ) -> Result<Option<VmRecord>, StoreError> {
        if take_one(&self.failing) {
            return Err(StoreError::Other("injected list failure".to_string()));
        }
        Ok(self.vms.lock().unwrap().get(&key(namespace, bios_uuid)).cloned())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(String, EventSeverity, String)>>,
}

impl RecordingEvents {
    pub fn all(&self) -> Vec<(String, EventSeverity, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, severity: EventSeverity) -> usize {
        self.all().iter().filter(|(_, s, _)| *s == severity).count()
    }
}

#[async_trait]
impl EventSink for RecordingEvents {
    async fn publish(&self, attachment: &CnsNodeVmAttachment, severity: EventSeverity, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((attachment.key(), severity, message.to_string()));
    }
}

/// Reconciler wired to in-memory fakes
pub struct Harness {
    pub attachments: Arc<InMemoryStore<CnsNodeVmAttachment>>,
    pub claims: Arc<InMemoryStore<PersistentVolumeClaim>>,
    pub resolver: Arc<FakeVolumeIdResolver>,
    pub inventory: Arc<FakeVmInventory>,
    pub backend: Arc<FakeBackend>,
    pub events: Arc<RecordingEvents>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(backend: FakeBackend) -> Self {
        let attachments = Arc::new(InMemoryStore::<CnsNodeVmAttachment>::default());
        let claims = Arc::new(InMemoryStore::<PersistentVolumeClaim>::default());
        let resolver = Arc::new(FakeVolumeIdResolver::default());
        let inventory = Arc::new(FakeVmInventory::default());
        let backend = Arc::new(backend);
        let events = Arc::new(RecordingEvents::default());

        let reconciler = Reconciler {
            attachments: AttachmentFinalizers::new(attachments.clone()),
            claims: ClaimFinalizers::new(claims.clone()),
            volume_ids: resolver.clone(),
            vm_inventory: inventory.clone(),
            backend: backend.clone(),
            events: events.clone(),
            backoff: BackoffRegistry::new(Duration::from_secs(1), Duration::from_secs(300)),
        };

        Self {
            attachments,
            claims,
            resolver,
            inventory,
            backend,
            events,
            reconciler,
        }
    }

    pub async fn reconcile(&self, name: &str) -> PassOutcome {
        reconcile_attachment(&self.reconciler, NAMESPACE, name)
            .await
            .expect("attachment read should succeed")
    }

    pub fn backoff(&self, name: &str) -> Option<Duration> {
        self.reconciler.backoff.peek(&key(NAMESPACE, name))
    }
}
