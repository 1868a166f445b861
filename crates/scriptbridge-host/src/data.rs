//! Collection lifecycle operations.
//!
//! A collection exists exactly when its metadata record exists: a JSON
//! `{"id": id}` document stored under the reserved metadata type tag with
//! the collection ID as the sole attribute. Member records are the
//! collection's own keyspace and are cleared by prefix enumeration when
//! the collection is deleted.

use std::sync::Arc;

use scriptbridge_common::coordinator::ScanCoordinator;
use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::{COLLECTION_METADATA_TAG, LedgerStub, create_composite_key};
use scriptbridge_core::Args;
use tracing::debug;

use crate::collection::DataCollection;
use crate::query::run_native_query;
use crate::registry::{ServiceObject, ServiceReply};

pub struct DataService {
    stub: Arc<dyn LedgerStub>,
    coordinator: ScanCoordinator,
}

impl DataService {
    pub fn new(stub: Arc<dyn LedgerStub>, coordinator: ScanCoordinator) -> Self {
        Self { stub, coordinator }
    }

    fn metadata_key(collection_id: &str) -> Result<String, ServiceError> {
        Ok(create_composite_key(
            COLLECTION_METADATA_TAG,
            &[collection_id],
        )?)
    }

    fn collection_exists(&self, collection_id: &str) -> Result<bool, ServiceError> {
        let key = Self::metadata_key(collection_id)?;
        Ok(self
            .stub
            .get_state(&key)?
            .is_some_and(|value| !value.is_empty()))
    }

    fn collection(&self, collection_id: &str) -> DataCollection {
        DataCollection::new(
            Arc::clone(&self.stub),
            self.coordinator.clone(),
            collection_id,
        )
    }

    /// Creates a collection, or reuses the ID when `force` is set.
    ///
    /// The existence check and the metadata write are not atomic across
    /// engine instances; two racing creators with `force` unset can both
    /// pass the check and the loser's metadata is silently overwritten.
    fn create_collection(
        &self,
        collection_id: &str,
        force: bool,
    ) -> Result<ServiceReply, ServiceError> {
        if !force && self.collection_exists(collection_id)? {
            return Err(ServiceError::failed(format!(
                "Failed to create collection with ID {collection_id} as it already exists"
            )));
        }
        debug!(collection_id = %collection_id, force, "Creating collection");

        let key = Self::metadata_key(collection_id)?;
        let metadata = serde_json::json!({ "id": collection_id });
        let value = serde_json::to_vec(&metadata).map_err(|err| {
            ServiceError::failed(format!("Failed to serialize collection metadata: {err}"))
        })?;
        self.stub.put_state(&key, &value)?;

        Ok(ServiceReply::Object(Arc::new(
            self.collection(collection_id),
        )))
    }

    /// Deletes a collection: every member record, then the metadata.
    ///
    /// Deleting members before metadata keeps a partial failure
    /// retryable; the collection still exists and a repeated delete
    /// resumes clearing.
    fn delete_collection(&self, collection_id: &str) -> Result<ServiceReply, ServiceError> {
        if !self.collection_exists(collection_id)? {
            return Err(ServiceError::failed(format!(
                "Collection with ID {collection_id} does not exist"
            )));
        }
        debug!(collection_id = %collection_id, "Deleting collection");

        let members = self.coordinator.serialize_scan(|| {
            self.stub
                .get_state_by_partial_composite_key(collection_id, &[])
        })?;
        for member in &members {
            self.stub.delete_state(&member.key)?;
        }

        let key = Self::metadata_key(collection_id)?;
        self.stub.delete_state(&key)?;
        Ok(ServiceReply::Unit)
    }

    fn get_collection(&self, collection_id: &str) -> Result<ServiceReply, ServiceError> {
        if !self.collection_exists(collection_id)? {
            return Err(ServiceError::failed(format!(
                "Collection with ID {collection_id} does not exist"
            )));
        }
        Ok(ServiceReply::Object(Arc::new(
            self.collection(collection_id),
        )))
    }

    fn exists_collection(&self, collection_id: &str) -> Result<ServiceReply, ServiceError> {
        Ok(ServiceReply::bool(self.collection_exists(collection_id)?))
    }
}

impl ServiceObject for DataService {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "create_collection" => {
                self.create_collection(args.text(0, "id")?, args.boolean(1, "force")?)
            }
            "delete_collection" => self.delete_collection(args.text(0, "id")?),
            "get_collection" => self.get_collection(args.text(0, "id")?),
            "exists_collection" => self.exists_collection(args.text(0, "id")?),
            "execute_query" => run_native_query(
                &self.stub,
                &self.coordinator,
                args.text(0, "query_string")?,
            ),
            other => Err(ServiceError::violation(format!(
                "unknown data service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataService").finish_non_exhaustive()
    }
}
