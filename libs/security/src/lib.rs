//! Inbound request authentication for botgate.
//!
//! The channel proves itself with a signed bearer token; [`TokenValidator`]
//! checks issuer, signature, expiry, and audience against a [`KeyIssuer`]
//! and a [`CredentialProvider`]. Fails closed.

pub mod credentials;
pub mod error;
pub mod keys;
pub mod validator;

pub use credentials::{AppCredentials, CredentialProvider, SimpleCredentialProvider};
pub use error::AuthError;
pub use keys::{JwksKeyIssuer, KeyIssuer, SigningKey, StaticKeyIssuer};
pub use validator::TokenValidator;
