pub mod access_jwt;
pub mod authenticator;
pub mod dpop;
pub mod factory;
pub mod guard;
pub mod identity;
pub mod jwks;
pub mod nonce;
pub mod options;
pub mod replay;

pub use access_jwt::{AccessTokenClaims, AccessTokenError, AccessTokenVerifier, CnfClaim};
pub use authenticator::{AuthRequest, Authenticated, Authenticator};
pub use factory::{build_authenticator, build_jti_store};
pub use guard::RouteGuard;
pub use identity::AuthCtx;
pub use jwks::{KeySetError, KeySetProvider, RemoteJwks, StaticKeySet};
pub use nonce::{NonceCodec, NonceSecret};
pub use options::{AuthOptions, AuthSetupError};
