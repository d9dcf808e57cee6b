pub mod auth;

pub use auth::{bearer_token, Principal, TokenVerifier};
