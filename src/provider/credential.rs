//! Credential resolution
//!
//! Credentials are issued and stored outside this library; resolvers only look
//! them up for a (provider, principal) pair. Secret values stay wrapped in
//! `SecretString` until a client needs them for a request header.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::MetricsError;
use crate::monitor::model::Provider;

/// Canonical credential variable names
pub mod variables {
    /// Access key id
    pub const ACCESS_KEY: &str = "access_key";
    /// Secret access key
    pub const SECRET_KEY: &str = "secret_key";
    /// Project/tenant id used in API paths
    pub const PROJECT_ID: &str = "project_id";
    /// Pre-issued API token
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Keystone user name
    pub const USERNAME: &str = "username";
    /// Keystone password
    pub const PASSWORD: &str = "password";
    /// Keystone project name
    pub const PROJECT_NAME: &str = "project_name";
    /// Keystone domain name
    pub const DOMAIN_NAME: &str = "domain_name";
    /// Keystone endpoint
    pub const AUTH_URL: &str = "auth_url";
}

/// Form in which a credential is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialType {
    /// Set of named variables (keys, tokens, endpoints)
    Variables,
    /// Single API key
    ApiKey,
}

/// Credential resolved for a provider call
#[derive(Debug)]
pub struct Credential {
    /// Provider the credential is valid for
    pub provider: Provider,
    /// Credential form
    pub credential_type: CredentialType,
    variables: HashMap<String, SecretString>,
}

impl Credential {
    /// Create an empty credential
    pub fn new(provider: Provider, credential_type: CredentialType) -> Self {
        Self {
            provider,
            credential_type,
            variables: HashMap::new(),
        }
    }

    /// Add a variable
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .insert(name.into(), SecretString::new(value.into()));
        self
    }

    /// Variable by canonical name
    pub fn variable(&self, name: &str) -> Option<&SecretString> {
        self.variables.get(name)
    }

    /// Variable by canonical name, failing when absent
    pub fn require(&self, name: &str) -> Result<&SecretString, MetricsError> {
        self.variable(name)
            .ok_or_else(|| MetricsError::IncompleteCredential {
                provider: self.provider,
                variable: name.to_string(),
            })
    }
}

/// Looks up credentials for provider calls
#[async_trait]
pub trait CredentialResolver: Send + Sync + std::fmt::Debug {
    /// Credential of `principal_id` for `provider`
    async fn get_credential(
        &self,
        provider: Provider,
        principal_id: &str,
        credential_type: CredentialType,
    ) -> Result<Arc<Credential>, MetricsError>;
}

/// In-memory resolver keyed by (provider, principal)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    credentials: Arc<RwLock<HashMap<(Provider, String), Arc<Credential>>>>,
}

impl StaticCredentialResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the credential of `principal_id`
    pub async fn insert(&self, principal_id: impl Into<String>, credential: Credential) {
        let mut credentials = self.credentials.write().await;
        credentials.insert(
            (credential.provider, principal_id.into()),
            Arc::new(credential),
        );
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn get_credential(
        &self,
        provider: Provider,
        principal_id: &str,
        credential_type: CredentialType,
    ) -> Result<Arc<Credential>, MetricsError> {
        let credentials = self.credentials.read().await;
        credentials
            .get(&(provider, principal_id.to_string()))
            .filter(|credential| credential.credential_type == credential_type)
            .cloned()
            .ok_or_else(|| MetricsError::CredentialNotFound {
                provider,
                principal_id: principal_id.to_string(),
            })
    }
}

/// Resolver reading process-wide credentials from environment variables
///
/// The principal is not used to select a credential: every principal shares
/// the credential configured for the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialResolver;

impl EnvCredentialResolver {
    /// Environment variables read for `provider` as (variable, canonical name, required)
    fn mapping(provider: Provider) -> &'static [(&'static str, &'static str, bool)] {
        match provider {
            Provider::HuaweiCloud => &[
                ("HW_ACCESS_KEY", variables::ACCESS_KEY, true),
                ("HW_SECRET_KEY", variables::SECRET_KEY, true),
                ("HW_PROJECT_ID", variables::PROJECT_ID, false),
                ("HW_AUTH_TOKEN", variables::AUTH_TOKEN, false),
            ],
            Provider::FlexibleEngine => &[
                ("OS_ACCESS_KEY", variables::ACCESS_KEY, true),
                ("OS_SECRET_KEY", variables::SECRET_KEY, true),
                ("OS_PROJECT_ID", variables::PROJECT_ID, false),
                ("OS_AUTH_TOKEN", variables::AUTH_TOKEN, false),
            ],
            Provider::OpenStack | Provider::Scs => &[
                ("OS_USERNAME", variables::USERNAME, true),
                ("OS_PASSWORD", variables::PASSWORD, true),
                ("OS_PROJECT_NAME", variables::PROJECT_NAME, false),
                ("OS_DOMAIN_NAME", variables::DOMAIN_NAME, false),
                ("OS_AUTH_URL", variables::AUTH_URL, false),
                ("OS_PROJECT_ID", variables::PROJECT_ID, false),
                ("OS_AUTH_TOKEN", variables::AUTH_TOKEN, false),
            ],
        }
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn get_credential(
        &self,
        provider: Provider,
        principal_id: &str,
        credential_type: CredentialType,
    ) -> Result<Arc<Credential>, MetricsError> {
        let not_found = || MetricsError::CredentialNotFound {
            provider,
            principal_id: principal_id.to_string(),
        };

        if credential_type != CredentialType::Variables {
            return Err(not_found());
        }

        let mut credential = Credential::new(provider, credential_type);
        for (env_var, name, required) in Self::mapping(provider) {
            match env::var(env_var) {
                Ok(value) if !value.is_empty() => {
                    credential = credential.with_variable(*name, value);
                }
                _ if *required => {
                    debug!(
                        provider = %provider,
                        env_var = *env_var,
                        "Required credential variable is not set"
                    );
                    return Err(not_found());
                }
                _ => {}
            }
        }

        Ok(Arc::new(credential))
    }
}
