use std::fmt;

use error_stack::Context;

/// An `EntityExtractor`, `RelationExtractor`, or `EmbeddingProvider` call
/// raised. Aborts the current text unit; recorded in the unit's result
/// rather than propagated to the caller (§7).
#[derive(Debug)]
#[must_use]
pub struct ExtractionError;

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an entity/relation extractor or embedding provider call failed")
    }
}

impl Context for ExtractionError {}

/// Raised synchronously before any work begins: `build_batch` was called with
/// `texts` and `sources` of different lengths.
#[derive(Debug)]
#[must_use]
pub struct ConfigurationError;

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid graph-builder batch configuration")
    }
}

impl Context for ConfigurationError {}

/// A `DocumentParser` returned empty content, and the plain-text fallback
/// read also produced nothing usable.
#[derive(Debug)]
#[must_use]
pub struct EmptyDocumentError;

impl fmt::Display for EmptyDocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the document parsed to empty or whitespace-only content")
    }
}

impl Context for EmptyDocumentError {}
