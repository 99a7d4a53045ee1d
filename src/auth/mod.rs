pub mod password;
pub mod store;

pub use store::{CredentialStore, StoreError, StoreOptions};
