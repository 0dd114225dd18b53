mod core;
mod pipelines;
mod repository;

pub use self::core::GitLabClient;
