pub mod archive;
pub mod aws;
pub mod identity;
pub mod object_store;
pub mod scratch;
