//! Background cache jobs

pub mod coordinator;

pub use coordinator::CacheCoordinator;
