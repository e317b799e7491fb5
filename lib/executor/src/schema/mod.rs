pub mod id;
pub mod metadata;
