use std::fmt;

use error_stack::Context;

/// Raised synchronously before any row is read: an invalid `SchemaMapping`,
/// contradictory reshape arguments, or a sheet/array-key that does not exist
/// in the source. Propagates to the caller per §7 — it is never recorded into
/// an [`crate::ImportResult`].
#[derive(Debug)]
#[must_use]
pub struct ConfigurationError;

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid structured-pipeline configuration")
    }
}

impl Context for ConfigurationError {}

/// A tabular source (CSV/JSON/Excel/SPSS) could not be opened or parsed at
/// all — distinct from a single malformed row, which is a `TransformationError`
/// recorded per-row. Raised synchronously from `import_from_*` before any row
/// is processed, so it propagates like `ConfigurationError` rather than being
/// folded into `ImportResult::errors`.
#[derive(Debug)]
#[must_use]
pub struct ReaderError;

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the tabular source could not be opened or parsed")
    }
}

impl Context for ReaderError {}

/// The store signalled a fatal condition mid-import (as opposed to an
/// individual write failure, which is logged and counted but does not abort
/// the batch). Propagates to the caller per §7.
#[derive(Debug)]
#[must_use]
pub struct FatalStorageError;

impl fmt::Display for FatalStorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the graph store signalled a fatal condition during import")
    }
}

impl Context for FatalStorageError {}
