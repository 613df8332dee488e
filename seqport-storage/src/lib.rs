//! Storage for Seqport: catalog, artifact cache and the on-disk reconciler

pub mod cache;
pub mod catalog;
pub mod reconcile;
pub mod staged;

// Re-export from staged module
pub use staged::{Commit, DoneMarker, StagedArtifact};

// Re-export from cache module
pub use cache::{ArtifactCache, CacheEntryStatus, CacheKey, CachedArtifact, LocalCopy};

// Re-export from catalog module
pub use catalog::{Catalog, InMemoryCatalog};

// Re-export from reconcile module
pub use reconcile::{
    disk_usage, ArtifactClass, ArtifactClassRegistry, ArtifactReconciler, ClassReport,
    ExpectedEntry, ExpectedSet, ReconcileReport, SidecarRules,
};
