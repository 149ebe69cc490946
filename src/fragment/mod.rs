//! Higher-level fragments built on the compiler: bucketed dimensions,
//! quickselects, the in-memory registry, and the compilation cache.

pub mod bucket;
pub mod cache;
pub mod quickselect;
pub mod registry;

pub use bucket::{build_buckets, expand_buckets, Bucket, BucketExpansion, BucketSpec};
pub use cache::{CacheKey, CompilationCache};
pub use quickselect::{build_quickselects, QuickselectSet, QuickselectSpec};
pub use registry::{FragmentDefinition, FragmentKind, Shelf, ShelfEntry};
