//! Member operations on one named collection.
//!
//! A collection is a keyspace of JSON object records. Members are stored
//! under composite keys built from the collection ID as the type tag and
//! the object ID as the sole attribute; enumeration is a prefix scan over
//! that keyspace, serialized through the [`ScanCoordinator`].

use std::sync::Arc;

use scriptbridge_common::coordinator::ScanCoordinator;
use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::{LedgerStub, create_composite_key};
use scriptbridge_core::Args;
use tracing::debug;

use crate::registry::{ServiceObject, ServiceReply};

pub struct DataCollection {
    stub: Arc<dyn LedgerStub>,
    coordinator: ScanCoordinator,
    collection_id: String,
}

impl DataCollection {
    pub fn new(
        stub: Arc<dyn LedgerStub>,
        coordinator: ScanCoordinator,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            stub,
            coordinator,
            collection_id: collection_id.into(),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    fn member_key(&self, object_id: &str) -> Result<String, ServiceError> {
        Ok(create_composite_key(&self.collection_id, &[object_id])?)
    }

    fn member_exists(&self, object_id: &str) -> Result<bool, ServiceError> {
        let key = self.member_key(object_id)?;
        Ok(self
            .stub
            .get_state(&key)?
            .is_some_and(|value| !value.is_empty()))
    }

    fn get_all(&self) -> Result<ServiceReply, ServiceError> {
        debug!(collection_id = %self.collection_id, "Enumerating collection members");
        let entries = self.coordinator.serialize_scan(|| {
            self.stub
                .get_state_by_partial_composite_key(&self.collection_id, &[])
        })?;

        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            let object: serde_json::Value = serde_json::from_slice(&entry.value)
                .map_err(|err| ServiceError::failed(format!("Failed to parse stored object: {err}")))?;
            objects.push(object);
        }
        Ok(ServiceReply::json(serde_json::Value::Array(objects)))
    }

    fn get(&self, object_id: &str) -> Result<ServiceReply, ServiceError> {
        let key = self.member_key(object_id)?;
        let value = self.stub.get_state(&key)?.filter(|value| !value.is_empty());
        let Some(value) = value else {
            return Err(ServiceError::failed(format!(
                "Object with ID '{object_id}' in collection with ID '{}' does not exist",
                self.collection_id
            )));
        };
        let object: serde_json::Value = serde_json::from_slice(&value)
            .map_err(|err| ServiceError::failed(format!("Failed to parse stored object: {err}")))?;
        Ok(ServiceReply::json(object))
    }

    fn exists(&self, object_id: &str) -> Result<ServiceReply, ServiceError> {
        Ok(ServiceReply::bool(self.member_exists(object_id)?))
    }

    fn add(
        &self,
        object_id: &str,
        object: &serde_json::Value,
        force: bool,
    ) -> Result<ServiceReply, ServiceError> {
        if !force && self.member_exists(object_id)? {
            return Err(ServiceError::failed(format!(
                "Failed to add object with ID '{object_id}' in collection with ID '{}' as the object already exists",
                self.collection_id
            )));
        }
        debug!(
            collection_id = %self.collection_id,
            object_id = %object_id,
            force,
            "Adding object"
        );
        let key = self.member_key(object_id)?;
        let value = serde_json::to_vec(object)
            .map_err(|err| ServiceError::failed(format!("Failed to serialize object: {err}")))?;
        self.stub.put_state(&key, &value)?;
        Ok(ServiceReply::Unit)
    }

    fn update(
        &self,
        object_id: &str,
        object: &serde_json::Value,
    ) -> Result<ServiceReply, ServiceError> {
        if !self.member_exists(object_id)? {
            return Err(ServiceError::failed(format!(
                "Failed to update object with ID '{object_id}' in collection with ID '{}' as the object does not exist",
                self.collection_id
            )));
        }
        debug!(
            collection_id = %self.collection_id,
            object_id = %object_id,
            "Updating object"
        );
        let key = self.member_key(object_id)?;
        let value = serde_json::to_vec(object)
            .map_err(|err| ServiceError::failed(format!("Failed to serialize object: {err}")))?;
        self.stub.put_state(&key, &value)?;
        Ok(ServiceReply::Unit)
    }

    fn remove(&self, object_id: &str) -> Result<ServiceReply, ServiceError> {
        if !self.member_exists(object_id)? {
            return Err(ServiceError::failed(format!(
                "Failed to delete object with ID '{object_id}' in collection with ID '{}' as the object does not exist",
                self.collection_id
            )));
        }
        debug!(
            collection_id = %self.collection_id,
            object_id = %object_id,
            "Removing object"
        );
        let key = self.member_key(object_id)?;
        self.stub.delete_state(&key)?;
        Ok(ServiceReply::Unit)
    }
}

impl ServiceObject for DataCollection {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "get_all" => self.get_all(),
            "get" => self.get(args.text(0, "id")?),
            "exists" => self.exists(args.text(0, "id")?),
            "add" => self.add(
                args.text(0, "id")?,
                args.json(1, "object")?,
                args.boolean(2, "force")?,
            ),
            "update" => self.update(args.text(0, "id")?, args.json(1, "object")?),
            "remove" => self.remove(args.text(0, "id")?),
            other => Err(ServiceError::violation(format!(
                "unknown collection method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for DataCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollection")
            .field("collection_id", &self.collection_id)
            .finish_non_exhaustive()
    }
}
