pub mod backup;
pub mod credentials;
pub mod retention;
