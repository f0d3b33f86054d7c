//! Request signing for the remote compute platform.

use crate::error::{Error, Result};

/// Trait for adding authentication headers to outgoing requests.
///
/// The credential itself is supplied by the authentication collaborator;
/// this client never refreshes or revokes it.
pub trait RequestAuth: Send + Sync {
    /// Sign a request by adding authentication headers.
    ///
    /// `url` is the full request URL, `headers` is a mutable list where
    /// auth headers should be inserted.
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}

/// Bearer-token authentication.
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl RequestAuth for BearerAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        if self.token.is_empty() {
            return Err(Error::Auth("empty bearer token".to_string()));
        }
        headers.push(("Authorization".to_string(), format!("Bearer {}", self.token)));
        Ok(())
    }
}

/// No authentication, for public or locally mocked endpoints.
pub struct NoAuth;

impl RequestAuth for NoAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        _headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        Ok(())
    }
}
