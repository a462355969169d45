use std::fmt;

use error_stack::Context;

/// An invalid `SchemaMapping`: duplicate type names, a transformation or
/// relation endpoint referencing a column outside `source_columns`, an
/// unknown `COMPUTE` function name, or contradictory reshape arguments.
/// Raised synchronously, before any row is read.
#[derive(Debug)]
#[must_use]
pub struct ConfigurationError;

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid schema mapping or reshape configuration")
    }
}

impl Context for ConfigurationError {}

/// A single row failed to transform: a type cast could not coerce its input,
/// a relation's endpoint id column was missing or empty, or a `COMPUTE`
/// function's declared inputs were missing from the row.
#[derive(Debug)]
#[must_use]
pub struct TransformationError;

impl fmt::Display for TransformationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a row could not be transformed by the schema mapping")
    }
}

impl Context for TransformationError {}

/// A data-quality rule was violated on a row evaluated with
/// `fail_on_violations = true`.
#[derive(Debug)]
#[must_use]
pub struct QualityViolationError;

impl fmt::Display for QualityViolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a data-quality rule was violated and fail_on_violations is set")
    }
}

impl Context for QualityViolationError {}
