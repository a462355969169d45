//! The `GraphStore` interface (§4.1) and property-storage optimisation
//! (§4.2), plus an in-memory reference implementation used across this
//! workspace's tests.

mod error;
mod memory;
mod property_optimizer;
mod store;

pub use self::{
    error::{
        BackendError, DuplicateIdError, InsertionError, NotFoundError, NotInitializedError,
        QueryError, UnsupportedQueryError,
    },
    memory::InMemoryGraphStore,
    property_optimizer::{
        CompressedProperties, PropertyOptimizer, PropertyOptimizerConfig, StoredProperties,
        DEFAULT_COMPRESSION_THRESHOLD,
    },
    store::{Direction, GraphStats, GraphStore, StoreWriteError},
};
