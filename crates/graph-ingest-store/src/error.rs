use std::fmt;

use error_stack::Context;

/// The store was used before `initialise` or after `close`.
#[derive(Debug)]
#[must_use]
pub struct NotInitializedError;

impl fmt::Display for NotInitializedError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("the store has not been initialised, or has already been closed")
    }
}

impl Context for NotInitializedError {}

/// An `add_entity`/`add_relation` call supplied an id that already exists.
#[derive(Debug)]
#[must_use]
pub struct DuplicateIdError;

impl fmt::Display for DuplicateIdError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("an entity or relation with this id already exists in the store")
    }
}

impl Context for DuplicateIdError {}

/// A `get_*` call could not find the requested record.
#[derive(Debug)]
#[must_use]
pub struct NotFoundError;

impl fmt::Display for NotFoundError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("the requested entity or relation does not exist")
    }
}

impl Context for NotFoundError {}

/// A query was requested that the store cannot answer without an index it
/// does not have (e.g. `get_entities_by_property` on an unindexed key).
#[derive(Debug)]
#[must_use]
pub struct UnsupportedQueryError;

impl fmt::Display for UnsupportedQueryError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("the store cannot answer this query without a supporting index")
    }
}

impl Context for UnsupportedQueryError {}

/// Any other backend failure.
#[derive(Debug)]
#[must_use]
pub struct BackendError;

impl fmt::Display for BackendError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("the store's backend encountered an error")
    }
}

impl Context for BackendError {}

#[derive(Debug)]
#[must_use]
pub struct InsertionError;

impl fmt::Display for InsertionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("could not insert into the store")
    }
}

impl Context for InsertionError {}

#[derive(Debug)]
#[must_use]
pub struct QueryError;

impl fmt::Display for QueryError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("could not query the store")
    }
}

impl Context for QueryError {}
