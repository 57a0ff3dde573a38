//! Access token persistence.

mod env_file;

pub use env_file::EnvFileCredentialStore;
