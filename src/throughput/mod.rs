pub mod changes;
pub mod metrics;
pub mod refs;
pub mod timeline;
