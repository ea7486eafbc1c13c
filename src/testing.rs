use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use tokio::sync::RwLock;

use crate::client::VcfaClient;
use crate::config::{ClientConfig, ProviderConfig};
use crate::provider::SharedClient;

/// Client logged in with a static token against `server`.
pub(crate) async fn mock_client(server: &MockServer) -> SharedClient {
    let config = ClientConfig::resolve_with(
        &ProviderConfig {
            url: Some(server.base_url()),
            auth_type: Some("token".to_string()),
            token: Some("test-token".to_string()),
            max_retry_timeout: Some(1),
            ..Default::default()
        },
        |_| None,
    )
    .unwrap();

    let client = VcfaClient::connect(&config)
        .await
        .unwrap()
        .with_intervals(Duration::from_millis(10), Duration::from_millis(10));
    Arc::new(RwLock::new(Some(client)))
}
