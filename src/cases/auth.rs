//! Auth-provider boundary for case-management calls.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::CaseApiError;

/// Credentials for one jurisdiction's case-management access.
#[derive(Clone)]
pub struct Credentials {
    pub service_token: SecretString,
    pub user_token: SecretString,
    pub user_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token values never reach logs.
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Issues credentials per jurisdiction. Caching is the provider's concern,
/// not the pipeline's.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn credentials_for(&self, jurisdiction: &str) -> Result<Credentials, CaseApiError>;
}

/// Provider backed by a fixed jurisdiction → credentials map, built once
/// at startup.
pub struct StaticAuthProvider {
    credentials: HashMap<String, Credentials>,
}

impl StaticAuthProvider {
    pub fn new(credentials: HashMap<String, Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn credentials_for(&self, jurisdiction: &str) -> Result<Credentials, CaseApiError> {
        self.credentials
            .get(jurisdiction)
            .cloned()
            .ok_or_else(|| CaseApiError::Auth {
                jurisdiction: jurisdiction.to_string(),
                message: "no credentials configured".to_string(),
            })
    }
}
