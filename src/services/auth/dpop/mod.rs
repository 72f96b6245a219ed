pub mod claims;
pub mod core;
pub mod htu;
pub mod thumbprint;
pub mod types;

pub use self::core::{DpopError, DpopVerifier};
pub use htu::effective_url;
pub use thumbprint::{access_token_hash, jwk_thumbprint};
pub use types::{DpopClaims, ProofRequest, VerifiedDpop};
