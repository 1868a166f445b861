//! Host ledger stub abstraction.
//!
//! The bridge consumes the host ledger exclusively through the
//! [`LedgerStub`] trait: raw key-value access, composite-key prefix scans,
//! native query execution, caller identity, invocation metadata, and event
//! emission. One stub instance belongs to exactly one transaction and must
//! never be shared across transactions.
//!
//! Composite keys follow the host convention: a `U+0000` namespace prefix,
//! then the object type and each attribute, each terminated by `U+0000`.
//! Collection metadata records live under the reserved
//! [`COLLECTION_METADATA_TAG`] type with the collection ID as the sole
//! attribute; member records use the collection ID itself as the type tag.
//! A collection whose ID equals the reserved tag would therefore collide
//! with the metadata keyspace; callers get the same exposure the original
//! store had.

use crate::error::LedgerError;

/// Separator between composite key components.
const DELIMITER: char = '\u{0000}';

/// Reserved composite-key type tag for collection metadata records.
pub const COLLECTION_METADATA_TAG: &str = "$syscollections";

/// Reserved state key persisting the runtime log level.
pub const LOG_LEVEL_STATE_KEY: &str = "ScriptBridgeLogLevel";

/// A key-value pair yielded by a prefix-range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    /// The full composite key.
    pub key: String,
    /// The stored byte value.
    pub value: Vec<u8>,
}

/// The narrow interface the bridge consumes from the host ledger.
///
/// Implementations must be safe to call from the single thread that owns
/// the transaction; `Send + Sync` is required only so a stub can be handed
/// to the per-call context through shared references.
pub trait LedgerStub: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Write `value` under `key`, replacing any existing value.
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    /// Delete the value stored under `key`. Deleting an absent key is not
    /// an error.
    fn delete_state(&self, key: &str) -> Result<(), LedgerError>;

    /// Enumerate every entry whose composite key starts with the given
    /// object type and attribute prefix, in the store's own order.
    fn get_state_by_partial_composite_key(
        &self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<StateEntry>, LedgerError>;

    /// Execute a platform-native query and return the raw result values.
    ///
    /// Platforms without native query support return
    /// [`LedgerError::QueryNotSupported`].
    fn execute_query(&self, query: &str) -> Result<Vec<Vec<u8>>, LedgerError>;

    /// The opaque creator blob identifying the transaction submitter.
    fn creator(&self) -> Result<Vec<u8>, LedgerError>;

    /// The function name and string arguments of the raw invocation.
    fn function_and_parameters(&self) -> (String, Vec<String>);

    /// The unique identifier of the current transaction.
    fn transaction_id(&self) -> String;

    /// Emit a named event with an opaque payload, recorded at commit.
    fn set_event(&self, name: &str, payload: &[u8]) -> Result<(), LedgerError>;
}

/// Build a composite key from an object type and its attributes.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidCompositeKey`] if any component is empty
/// or contains the `U+0000` delimiter.
pub fn create_composite_key(
    object_type: &str,
    attributes: &[&str],
) -> Result<String, LedgerError> {
    validate_component("object type", object_type)?;
    let mut key = String::with_capacity(2 + object_type.len());
    key.push(DELIMITER);
    key.push_str(object_type);
    key.push(DELIMITER);
    for attribute in attributes {
        validate_component("attribute", attribute)?;
        key.push_str(attribute);
        key.push(DELIMITER);
    }
    Ok(key)
}

/// Split a composite key back into its object type and attributes.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidCompositeKey`] if the key does not carry
/// the namespace prefix or has no object type.
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>), LedgerError> {
    let rest = key.strip_prefix(DELIMITER).ok_or_else(|| {
        LedgerError::invalid_composite_key("missing namespace prefix")
    })?;
    let mut components = rest.split(DELIMITER);
    let object_type = components
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LedgerError::invalid_composite_key("missing object type"))?;
    let attributes: Vec<String> = components
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
        .collect();
    Ok((object_type.to_string(), attributes))
}

fn validate_component(what: &str, component: &str) -> Result<(), LedgerError> {
    if component.is_empty() {
        return Err(LedgerError::invalid_composite_key(format!(
            "{what} must not be empty"
        )));
    }
    if component.contains(DELIMITER) {
        return Err(LedgerError::invalid_composite_key(format!(
            "{what} must not contain U+0000"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_layout() {
        let key = create_composite_key("assets", &["A1"]).unwrap();
        assert_eq!(key, "\u{0}assets\u{0}A1\u{0}");
    }

    #[test]
    fn test_composite_key_prefix_nesting() {
        // A key built from a subset of attributes is a strict prefix of the
        // full key, which is what prefix-range scans rely on.
        let full = create_composite_key("assets", &["A1"]).unwrap();
        let prefix = create_composite_key("assets", &[]).unwrap();
        assert!(full.starts_with(&prefix));

        let other = create_composite_key("asset", &[]).unwrap();
        assert!(!full.starts_with(&other));
    }

    #[test]
    fn test_split_round_trip() {
        let key = create_composite_key(COLLECTION_METADATA_TAG, &["assets"]).unwrap();
        let (object_type, attributes) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, COLLECTION_METADATA_TAG);
        assert_eq!(attributes, vec!["assets".to_string()]);
    }

    #[test]
    fn test_rejects_delimiter_in_component() {
        let err = create_composite_key("as\u{0}sets", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCompositeKey { .. }));

        let err = create_composite_key("assets", &["A\u{0}1"]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCompositeKey { .. }));
    }

    #[test]
    fn test_rejects_empty_components() {
        assert!(create_composite_key("", &[]).is_err());
        assert!(create_composite_key("assets", &[""]).is_err());
    }

    #[test]
    fn test_split_rejects_plain_key() {
        assert!(split_composite_key("ScriptBridgeLogLevel").is_err());
    }
}
