pub mod app_config;
pub mod credential_repo;

pub use app_config::Config;
pub use credential_repo::InMemoryCredentialStore;
