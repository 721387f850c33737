pub mod cache;
pub mod credentials;
pub mod error;
pub mod lock;
pub mod store;

pub use cache::{CacheOptions, CredentialCache};
pub use credentials::AwsCredentials;
pub use error::CacheError;
