//! Compiled business-logic bundles.
//!
//! A bundle is the transaction-function source deployed alongside the
//! chaincode. It is compiled exactly once, at container startup; pooled
//! instances then share the compiled form and never reparse the source.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rhai::{AST, Engine};
use scriptbridge_common::error::BridgeError;

/// A validated, compiled script bundle.
pub struct ScriptBundle {
    source: String,
    ast: AST,
    content_hash: u64,
}

impl ScriptBundle {
    /// Compiles bundle source, rejecting anything that fails to parse.
    ///
    /// Compilation uses a bare engine: host natives are late-bound, so a
    /// bundle may reference them freely without them being registered yet.
    pub fn compile(source: &str) -> Result<Self, BridgeError> {
        let engine = Engine::new();
        let ast = engine
            .compile(source)
            .map_err(|err| BridgeError::invalid_bundle(format!("compilation failed: {err}")))?;

        Ok(Self {
            source: source.to_string(),
            ast,
            content_hash: compute_hash(source.as_bytes()),
        })
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled form, merged into each instance's glue at fabrication.
    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }

    /// Hash of the source bytes, for logging and cache keys.
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Whether the bundle defines a top-level function with this name.
    pub fn defines_function(&self, name: &str) -> bool {
        self.ast.iter_functions().any(|f| f.name == name)
    }
}

impl std::fmt::Debug for ScriptBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBundle")
            .field("source_len", &self.source.len())
            .field("content_hash", &format!("{:016x}", self.content_hash))
            .finish_non_exhaustive()
    }
}

fn compute_hash(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_BUNDLE: &str = r"
        fn invoke(context, function_name, parameters, callback) {
            callback.call((), ());
        }
    ";

    #[test]
    fn test_compile_minimal_bundle() {
        let bundle = ScriptBundle::compile(MINIMAL_BUNDLE).unwrap();
        assert!(bundle.defines_function("invoke"));
        assert!(!bundle.defines_function("init"));
        assert_eq!(bundle.source(), MINIMAL_BUNDLE);
    }

    #[test]
    fn test_compile_rejects_syntax_errors() {
        let err = ScriptBundle::compile("fn invoke( {").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidBundle { .. }));
        assert!(err.to_string().contains("compilation failed"));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = ScriptBundle::compile(MINIMAL_BUNDLE).unwrap();
        let b = ScriptBundle::compile(MINIMAL_BUNDLE).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let c = ScriptBundle::compile("fn init(c, f, p, cb) { cb.call((), ()); }").unwrap();
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_debug_does_not_dump_source() {
        let bundle = ScriptBundle::compile(MINIMAL_BUNDLE).unwrap();
        let rendered = format!("{bundle:?}");
        assert!(rendered.contains("content_hash"));
        assert!(!rendered.contains("callback"));
    }
}
