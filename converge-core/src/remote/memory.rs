//! In-memory remote API with configurable propagation delay.
//!
//! Objects are keyed by `(collection, native_id)`. After a create the object
//! can stay invisible for a number of reads, like a backend without
//! read-after-write consistency. Failures can be queued per call kind and
//! objects can be created or removed out of band.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{RemoteApi, RequestKind, WireRequest, WireResponse};
use crate::error::RemoteError;

/// Remote call kinds, for failure injection and call assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Create,
    Get,
    Update,
    Delete,
}

/// A recorded create or update request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub call: Call,
    pub collection: String,
    pub native_id: Option<String>,
    pub request: WireRequest,
}

type Key = (String, String);

#[derive(Default)]
struct Inner {
    objects: HashMap<Key, Value>,
    hidden: HashMap<Key, u32>,
    hidden_reads: u32,
    native_ids: VecDeque<String>,
    /// `None` entries let one call through.
    failures: HashMap<Call, VecDeque<Option<RemoteError>>>,
    calls: Vec<Call>,
    requests: Vec<RecordedRequest>,
}

/// In-memory [`RemoteApi`] implementation.
#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide every newly created object from the next `reads` get calls.
    pub fn with_hidden_reads(self, reads: u32) -> Self {
        self.lock().hidden_reads = reads;
        self
    }

    /// Use `native_id` for the next create instead of a random UUID.
    pub fn queue_native_id(&self, native_id: impl Into<String>) {
        self.lock().native_ids.push_back(native_id.into());
    }

    /// Fail the next call of the given kind with `error`.
    pub fn fail_next(&self, call: Call, error: RemoteError) {
        self.fail_after(call, 0, error);
    }

    /// Let `skip` calls of the given kind succeed, then fail one with
    /// `error`. Queues behind failures already pending.
    pub fn fail_after(&self, call: Call, skip: usize, error: RemoteError) {
        let mut inner = self.lock();
        let queue = inner.failures.entry(call).or_default();
        queue.extend(std::iter::repeat_n(None, skip));
        queue.push_back(Some(error));
    }

    /// Store an object directly, bypassing the create call.
    pub fn insert(&self, collection: &str, native_id: &str, body: Value) {
        let key = (collection.to_string(), native_id.to_string());
        self.lock().objects.insert(key, with_id(body, native_id));
    }

    /// Delete an object behind the reconciler's back.
    pub fn remove(&self, collection: &str, native_id: &str) -> bool {
        let key = (collection.to_string(), native_id.to_string());
        self.lock().objects.remove(&key).is_some()
    }

    /// Current stored body of an object, ignoring visibility.
    pub fn object(&self, collection: &str, native_id: &str) -> Option<Value> {
        let key = (collection.to_string(), native_id.to_string());
        self.lock().objects.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Most recent create or update request of the given kind.
    pub fn last_request(&self, call: Call) -> Option<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.call == call)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn begin(&mut self, call: Call) -> Result<(), RemoteError> {
        self.calls.push(call);
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

fn not_found(collection: &str, native_id: &str) -> RemoteError {
    RemoteError::NotFound(format!("{collection}/{native_id}"))
}

fn with_id(mut body: Value, native_id: &str) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("id".to_string(), Value::String(native_id.to_string()));
    }
    body
}

/// Apply an incremental body: `add<Field>`/`remove<Field>` arrays edit list
/// `<field>`, every other key overwrites.
fn apply_incremental(target: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        let list_op = key
            .strip_prefix("add")
            .map(|rest| (true, rest))
            .or_else(|| key.strip_prefix("remove").map(|rest| (false, rest)));

        match (list_op, value) {
            (Some((add, rest)), Value::Array(items)) if !rest.is_empty() => {
                let field = lower_first(rest);
                let list = target
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(list) = list {
                    if add {
                        for item in items {
                            if !list.contains(item) {
                                list.push(item.clone());
                            }
                        }
                    } else {
                        list.retain(|existing| !items.contains(existing));
                    }
                }
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn create_object(
        &self,
        collection: &str,
        request: &WireRequest,
    ) -> Result<String, RemoteError> {
        let mut inner = self.lock();
        inner.begin(Call::Create)?;

        let native_id = inner
            .native_ids
            .pop_front()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let key = (collection.to_string(), native_id.clone());

        inner
            .objects
            .insert(key.clone(), with_id(request.body.clone(), &native_id));
        let hidden_reads = inner.hidden_reads;
        if hidden_reads > 0 {
            inner.hidden.insert(key, hidden_reads);
        }
        inner.requests.push(RecordedRequest {
            call: Call::Create,
            collection: collection.to_string(),
            native_id: None,
            request: request.clone(),
        });
        Ok(native_id)
    }

    async fn get_object(
        &self,
        collection: &str,
        native_id: &str,
    ) -> Result<WireResponse, RemoteError> {
        let mut inner = self.lock();
        inner.begin(Call::Get)?;

        let key = (collection.to_string(), native_id.to_string());
        if let Some(remaining) = inner.hidden.get_mut(&key) {
            *remaining -= 1;
            if *remaining == 0 {
                inner.hidden.remove(&key);
            }
            return Err(not_found(collection, native_id));
        }

        match inner.objects.get(&key) {
            Some(body) => Ok(WireResponse::new(json!({ "data": body }))),
            None => Err(not_found(collection, native_id)),
        }
    }

    async fn update_object(
        &self,
        collection: &str,
        native_id: &str,
        request: &WireRequest,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.begin(Call::Update)?;

        let key = (collection.to_string(), native_id.to_string());
        let Some(current) = inner.objects.get_mut(&key) else {
            return Err(not_found(collection, native_id));
        };

        match (request.kind, current, &request.body) {
            (RequestKind::Incremental, Value::Object(target), Value::Object(delta)) => {
                apply_incremental(target, delta);
            }
            (_, current, body) => {
                *current = with_id(body.clone(), native_id);
            }
        }

        inner.requests.push(RecordedRequest {
            call: Call::Update,
            collection: collection.to_string(),
            native_id: Some(native_id.to_string()),
            request: request.clone(),
        });
        Ok(())
    }

    async fn delete_object(&self, collection: &str, native_id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.begin(Call::Delete)?;

        let key = (collection.to_string(), native_id.to_string());
        inner.hidden.remove(&key);
        match inner.objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(not_found(collection, native_id)),
        }
    }
}
