pub mod artifact_cache;
pub mod metadata_cache;
