//! Managed cloud graph provider: one Neo4j Aura instance per dataset.
//!
//! `create_dataset` exchanges OAuth2 client credentials for a token, issues
//! the provisioning request, polls until the instance is running, and hands
//! back the generated password encrypted for persistence.
//! `resolve_connection_info` decrypts it again at use time; the plaintext is
//! never written back and never cached.
//!
//! Cancelling mid-poll stops the polling but does not clean up a
//! partially-provisioned instance; that is left to the operator.

use crate::config::StorageConfig;
use crate::crypto;
use async_trait::async_trait;
use noema_types::{
    ConnectionDescriptor, DatasetDatabase, DatasetDatabaseHandler, RoutingError, User,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

pub const HANDLER_KEY: &str = "neo4j_aura";
const PROVIDER: &str = "neo4j";

const API_BASE: &str = "https://api.neo4j.io/v1";
const TOKEN_URL: &str = "https://api.neo4j.io/oauth/token";
// Aura instance names are limited to 30 characters.
const MAX_INSTANCE_NAME_LEN: usize = 30;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct InstanceResponse {
    data: InstanceData,
}

#[derive(Debug, Deserialize)]
struct InstanceData {
    id: String,
    #[serde(default)]
    connection_url: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    status: String,
}

struct CloudCredentials {
    client_id: String,
    client_secret: String,
    tenant_id: String,
}

pub struct ManagedCloudGraphHandler {
    config: StorageConfig,
    client: reqwest::Client,
}

impl ManagedCloudGraphHandler {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    // Read on every call rather than held in the struct, so secrets do not
    // outlive the operation that needs them.
    fn cloud_credentials() -> Result<CloudCredentials, RoutingError> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| {
                RoutingError::SecretResolution(format!(
                    "{name} must be set to provision managed cloud graph databases"
                ))
            })
        };
        Ok(CloudCredentials {
            client_id: read("NOEMA_AURA_CLIENT_ID")?,
            client_secret: read("NOEMA_AURA_CLIENT_SECRET")?,
            tenant_id: read("NOEMA_AURA_TENANT_ID")?,
        })
    }

    async fn fetch_token(&self, credentials: &CloudCredentials) -> Result<String, RoutingError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| RoutingError::SecretResolution(format!("token exchange failed: {e}")))?
            .error_for_status()
            .map_err(|e| RoutingError::SecretResolution(format!("token exchange failed: {e}")))?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RoutingError::SecretResolution(format!("token response invalid: {e}")))?;
        Ok(token.access_token)
    }

    async fn wait_until_running(&self, instance_id: &str, token: &str) -> Result<(), RoutingError> {
        let status_url = format!("{API_BASE}/instances/{instance_id}");
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            let response = self
                .client
                .get(&status_url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| RoutingError::Other(e.to_string()))?
                .error_for_status()
                .map_err(|e| RoutingError::Other(e.to_string()))?;
            let status: InstanceResponse = response
                .json()
                .await
                .map_err(|e| RoutingError::Other(e.to_string()))?;
            if status.data.status.eq_ignore_ascii_case("running") {
                return Ok(());
            }
            tracing::debug!(instance_id, attempt, status = %status.data.status, "waiting for instance");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(RoutingError::ProvisioningTimeout {
            attempts: MAX_POLL_ATTEMPTS,
            seconds: MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs(),
        })
    }
}

/// Instance id is the first label of the connection URL's hostname,
/// e.g. `neo4j+s://a1b2c3d4.databases.neo4j.io` -> `a1b2c3d4`.
fn instance_id_from_url(url: &str) -> Result<String, RoutingError> {
    let host = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url)
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default();
    let id = host.split('.').next().unwrap_or_default();
    if id.is_empty() {
        return Err(RoutingError::Other(format!(
            "cannot derive instance id from url: {url}"
        )));
    }
    Ok(id.to_string())
}

#[async_trait]
impl DatasetDatabaseHandler for ManagedCloudGraphHandler {
    async fn create_dataset(
        &self,
        dataset_id: Uuid,
        _user: &User,
    ) -> Result<ConnectionDescriptor, RoutingError> {
        if self.config.graph_provider != PROVIDER {
            return Err(RoutingError::UnsupportedProvider(format!(
                "{HANDLER_KEY} requires graph provider '{PROVIDER}', configured '{}'",
                self.config.graph_provider
            )));
        }

        let credentials = Self::cloud_credentials()?;
        let token = self.fetch_token(&credentials).await?;

        let mut instance_name = dataset_id.to_string();
        instance_name.truncate(MAX_INSTANCE_NAME_LEN);
        let payload = serde_json::json!({
            "version": "5",
            "region": "europe-west1",
            "memory": "1GB",
            "name": instance_name,
            "type": "professional-db",
            "tenant_id": credentials.tenant_id,
            "cloud_provider": "gcp",
        });

        let response = self
            .client
            .post(format!("{API_BASE}/instances"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?
            .error_for_status()
            .map_err(|e| RoutingError::Other(e.to_string()))?;
        let created: InstanceResponse = response
            .json()
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?;

        self.wait_until_running(&created.data.id, &token).await?;
        tracing::info!(%dataset_id, instance_id = %created.data.id, "cloud graph instance running");

        let encrypted_password =
            crypto::encrypt_secret(&self.config.encryption_key, &created.data.password)?;
        let mut connection_info = HashMap::new();
        connection_info.insert(
            "username".to_string(),
            serde_json::Value::String(created.data.username),
        );
        connection_info.insert(
            "password".to_string(),
            serde_json::Value::String(encrypted_password),
        );

        Ok(ConnectionDescriptor {
            // Aura databases are always named "neo4j".
            database_name: "neo4j".to_string(),
            provider: PROVIDER.to_string(),
            url: created.data.connection_url,
            key: None,
            connection_info,
            handler: HANDLER_KEY.to_string(),
        })
    }

    async fn resolve_connection_info(
        &self,
        mut dataset_database: DatasetDatabase,
    ) -> Result<DatasetDatabase, RoutingError> {
        let encrypted = dataset_database
            .graph_database_connection_info
            .get("password")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RoutingError::SecretResolution(
                    "dataset database has no stored graph password".to_string(),
                )
            })?;
        let password = crypto::decrypt_secret(&self.config.encryption_key, encrypted)?;
        dataset_database
            .graph_database_connection_info
            .insert("password".to_string(), serde_json::Value::String(password));
        Ok(dataset_database)
    }

    async fn delete_dataset(&self, dataset_database: &DatasetDatabase) -> Result<(), RoutingError> {
        let instance_id = instance_id_from_url(&dataset_database.graph_database_url)?;
        let credentials = Self::cloud_credentials()?;
        let token = self.fetch_token(&credentials).await?;

        self.client
            .delete(format!("{API_BASE}/instances/{instance_id}"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?
            .error_for_status()
            .map_err(|e| RoutingError::Other(e.to_string()))?;
        tracing::info!(dataset_id = %dataset_database.dataset_id, %instance_id, "cloud graph instance deleted");
        Ok(())
    }
}
