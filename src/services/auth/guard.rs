//! Per-route authorization gate.
use crate::error::{AuthError, TokenType};
use crate::services::auth::{authenticator::TOKEN_NOT_BOUND, identity::AuthCtx};

pub const NO_SCOPES: &str = "The access token has no scopes";

/// What one route demands of the authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    enforce_dpop: bool,
    required_scopes: Vec<String>,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enforce_dpop(mut self) -> Self {
        self.enforce_dpop = true;
        self
    }

    pub fn require_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }

    /// First failing requirement wins.
    pub fn check(&self, ctx: Option<&AuthCtx>) -> Result<(), AuthError> {
        let Some(ctx) = ctx else {
            return Err(AuthError::Unauthorized { realm: None });
        };

        if self.enforce_dpop && !ctx.is_dpop_bound() {
            return Err(AuthError::InvalidToken {
                scheme: TokenType::DPoP,
                realm: None,
                description: TOKEN_NOT_BOUND.to_string(),
            });
        }

        if self.required_scopes.is_empty() {
            return Ok(());
        }

        if ctx.scopes().next().is_none() {
            return Err(AuthError::insufficient_scope(NO_SCOPES));
        }

        if !ctx.has_scopes(&self.required_scopes) {
            return Err(AuthError::insufficient_scope(format!(
                "Required scopes are: '{}'",
                self.required_scopes.join(" ")
            )));
        }

        Ok(())
    }
}
