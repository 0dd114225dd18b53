mod changes;
mod core;
mod deployments;
mod pipelines;

pub use self::core::GitLabProvider;
