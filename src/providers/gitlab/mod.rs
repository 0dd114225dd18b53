mod client;
mod progress_bar;
mod provider;
mod types;

pub use provider::GitLabProvider;
