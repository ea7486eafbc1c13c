use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    Diagnostics, DynamicDataSource, DynamicResource, Provider,
};
use tokio::sync::RwLock;

use crate::client::{ClientError, VcfaClient};
use crate::config::{ClientConfig, ProviderConfig};
use crate::data_sources::{
    OrgDataSource, OrgLocalUserDataSource, RegionDataSource, RoleDataSource, VersionDataSource,
};
use crate::resources::{OrgLocalUserResource, OrgResource};

/// Client shared by the provider with every resource and data source.
///
/// Empty until Terraform calls `configure`.
pub type SharedClient = Arc<RwLock<Option<VcfaClient>>>;

#[derive(Debug, Default, Clone)]
pub struct VcfaProvider {
    pub client: SharedClient,
}

#[async_trait]
impl Provider for VcfaProvider {
    type Config<'a> = ProviderConfig;
    type MetaState<'a> = ();

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let string = |description: &str, sensitive: bool| Attribute {
            description: Description::plain(description),
            attr_type: AttributeType::String,
            constraint: AttributeConstraint::Optional,
            sensitive,
            ..Default::default()
        };

        let mut attributes: HashMap<String, Attribute> = map! {
            "url" => string("VCFA endpoint, e.g. https://vcfa.example.com (env: VCFA_URL)", false),
            "user" => string("User name for integrated login (env: VCFA_USER)", false),
            "password" => string("Password for integrated login (env: VCFA_PASSWORD)", true),
            "org" => string("Organization to log in to, default System (env: VCFA_ORG)", false),
            "auth_type" => string(
                "One of integrated, token, api_token, api_token_file, service_account_token_file (env: VCFA_AUTH_TYPE)",
                false,
            ),
            "token" => string("Bearer token for token auth (env: VCFA_TOKEN)", true),
            "api_token" => string("API token for api_token auth (env: VCFA_API_TOKEN)", true),
            "api_token_file" => string(
                "JSON file holding an API token (env: VCFA_API_TOKEN_FILE)",
                false,
            ),
            "service_account_token_file" => string(
                "JSON file holding a service account token, rewritten on login (env: VCFA_SA_TOKEN_FILE)",
                false,
            ),
            "import_separator" => string(
                "Separator for composite import ids, default '.' (env: VCFA_IMPORT_SEPARATOR)",
                false,
            )
        };

        attributes.insert(
            "allow_unverified_ssl".to_string(),
            Attribute {
                description: Description::plain(
                    "Skip TLS certificate verification (env: VCFA_ALLOW_UNVERIFIED_SSL)",
                ),
                attr_type: AttributeType::Bool,
                constraint: AttributeConstraint::Optional,
                ..Default::default()
            },
        );

        attributes.insert(
            "max_retry_timeout".to_string(),
            Attribute {
                description: Description::plain(
                    "Seconds to retry requests on busy entities, default 60 (env: VCFA_MAX_RETRY_TIMEOUT)",
                ),
                attr_type: AttributeType::Number,
                constraint: AttributeConstraint::Optional,
                ..Default::default()
            },
        );

        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("VMware Cloud Foundation Automation provider"),
                attributes,
                ..Default::default()
            },
        })
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let config = match ClientConfig::resolve(&config) {
            Ok(c) => c,
            Err(e) => {
                diags.root_error("Invalid provider configuration", e.to_string());
                return None;
            }
        };

        tracing::debug!(%terraform_version, ?config, "configuring provider");

        let client = match VcfaClient::connect(&config).await {
            Ok(c) => c,
            Err(e) => {
                report(diags, "Failed to connect to VCFA", &e);
                return None;
            }
        };

        let mut guard = self.client.write().await;
        *guard = Some(client);
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let mut resources: HashMap<String, Box<dyn DynamicResource>> = HashMap::new();
        resources.insert(
            "org".to_string(),
            Box::new(OrgResource::new(self.client.clone())),
        );
        resources.insert(
            "org_local_user".to_string(),
            Box::new(OrgLocalUserResource::new(self.client.clone())),
        );
        Some(resources)
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let mut data_sources: HashMap<String, Box<dyn DynamicDataSource>> = HashMap::new();
        data_sources.insert(
            "org".to_string(),
            Box::new(OrgDataSource::new(self.client.clone())),
        );
        data_sources.insert(
            "org_local_user".to_string(),
            Box::new(OrgLocalUserDataSource::new(self.client.clone())),
        );
        data_sources.insert(
            "role".to_string(),
            Box::new(RoleDataSource::new(self.client.clone())),
        );
        data_sources.insert(
            "region".to_string(),
            Box::new(RegionDataSource::new(self.client.clone())),
        );
        data_sources.insert(
            "version".to_string(),
            Box::new(VersionDataSource::new(self.client.clone())),
        );
        Some(data_sources)
    }
}

/// The configured client, or an error diagnostic when `configure` has not run.
pub(crate) async fn configured(
    client: &SharedClient,
    diags: &mut Diagnostics,
) -> Option<VcfaClient> {
    let guard = client.read().await;
    match guard.as_ref() {
        Some(client) => Some(client.clone()),
        None => {
            diags.root_error_short("provider is not configured");
            None
        }
    }
}

/// Record a client error as a diagnostic, without leaking credentials.
pub(crate) fn report(diags: &mut Diagnostics, summary: &'static str, error: &ClientError) {
    tracing::error!("{summary}: {error}");
    diags.root_error(summary, error.redacted());
}
