use async_trait::async_trait;
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::ValueEmpty,
    DataSource, Diagnostics,
};

use crate::client::types::Org;
use crate::client::ORGS_PATH;
use crate::provider::{configured, report, SharedClient};
use crate::resources::org::OrgState;

pub struct OrgDataSource {
    client: SharedClient,
}

impl OrgDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for OrgDataSource {
    type State<'a> = OrgState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let computed = |description: &str, attr_type: AttributeType| Attribute {
            description: Description::plain(description),
            attr_type,
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        };

        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Reads a VCFA organization by name"),
                attributes: map! {
                    "name" => Attribute {
                        description: Description::plain("Organization name"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "id" => computed("Organization URN", AttributeType::String),
                    "display_name" => computed("Human readable organization name", AttributeType::String),
                    "description" => computed("Organization description", AttributeType::String),
                    "is_enabled" => computed("Whether the organization is enabled", AttributeType::Bool),
                    "is_classic_tenant" => computed("Whether this is a classic tenant", AttributeType::Bool),
                    "managed_by_id" => computed("URN of the managing organization", AttributeType::String),
                    "managed_by_name" => computed("Name of the managing organization", AttributeType::String)
                },
                ..Default::default()
            },
        })
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = configured(&self.client, diags).await?;

        let org: Org = match client
            .get_by_name("organization", ORGS_PATH, config.name.as_str(), None)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                report(diags, "Failed to read organization", &e);
                return None;
            }
        };

        let mut state = config;
        state.refresh(org);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_client;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::borrow::Cow;
    use tf_provider::value::Value;

    #[tokio::test]
    async fn read_fills_computed_attributes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cloudapi/1.0.0/orgs")
                    .query_param("filter", "name==acme");
                then.status(200).json_body(json!({
                    "resultTotal": 1, "pageCount": 1,
                    "values": [{
                        "id": "urn:vcloud:org:42",
                        "name": "acme",
                        "displayName": "ACME Corp",
                        "description": "tenant",
                        "isEnabled": false
                    }]
                }));
            })
            .await;

        let data_source = OrgDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();
        let config = OrgState {
            name: Value::Value(Cow::Borrowed("acme")),
            ..Default::default()
        };

        let state = data_source
            .read(&mut diags, config, ValueEmpty::default())
            .await
            .expect("read should succeed");

        assert_eq!(state.id.as_str(), "urn:vcloud:org:42");
        assert_eq!(state.description.as_str(), "tenant");
        assert_eq!(state.is_enabled, Value::Value(false));
    }

    #[tokio::test]
    async fn read_reports_unknown_org() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cloudapi/1.0.0/orgs");
                then.status(200)
                    .json_body(json!({"resultTotal": 0, "pageCount": 0, "values": []}));
            })
            .await;

        let data_source = OrgDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();
        let config = OrgState {
            name: Value::Value(Cow::Borrowed("ghost")),
            ..Default::default()
        };

        let result = data_source
            .read(&mut diags, config, ValueEmpty::default())
            .await;

        assert!(result.is_none());
        assert!(diags.errors[0].detail.contains("'ghost' not found"));
    }
}
