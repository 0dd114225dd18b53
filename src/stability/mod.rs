pub mod metrics;
pub mod model;
