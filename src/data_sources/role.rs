use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueBool, ValueEmpty, ValueString},
    DataSource, Diagnostics,
};

use crate::client::types::Role;
use crate::client::ROLES_PATH;
use crate::provider::{configured, report, SharedClient};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoleState<'a> {
    #[serde(borrow)]
    pub id: ValueString<'a>,
    #[serde(borrow)]
    pub org_id: ValueString<'a>,
    #[serde(borrow)]
    pub name: ValueString<'a>,
    #[serde(borrow)]
    pub description: ValueString<'a>,
    #[serde(borrow)]
    pub bundle_key: ValueString<'a>,
    pub read_only: ValueBool,
}

pub struct RoleDataSource {
    client: SharedClient,
}

impl RoleDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for RoleDataSource {
    type State<'a> = RoleState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Reads a role available to a VCFA organization"),
                attributes: map! {
                    "id" => Attribute {
                        description: Description::plain("Role URN"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "org_id" => Attribute {
                        description: Description::plain("URN of the organization the role belongs to"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        description: Description::plain("Role name"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        description: Description::plain("Role description"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "bundle_key" => Attribute {
                        description: Description::plain("Key used for localized role names"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "read_only" => Attribute {
                        description: Description::plain("Whether the role is predefined and read-only"),
                        attr_type: AttributeType::Bool,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    }
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

        let role: Role = match client
            .get_by_name(
                "role",
                ROLES_PATH,
                config.name.as_str(),
                Some(config.org_id.as_str()),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                report(diags, "Failed to read role", &e);
                return None;
            }
        };

        let mut state = config;
        state.id = Value::Value(Cow::Owned(role.id));
        state.description = Value::Value(Cow::Owned(role.description));
        state.bundle_key = Value::Value(Cow::Owned(role.bundle_key));
        state.read_only = Value::Value(role.read_only);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_client;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn read_looks_up_role_in_tenant() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cloudapi/1.0.0/roles")
                    .query_param("filter", "name==Organization Administrator")
                    .header("X-VMWARE-VCLOUD-TENANT-CONTEXT", "42");
                then.status(200).json_body(json!({
                    "resultTotal": 1, "pageCount": 1,
                    "values": [{
                        "id": "urn:vcloud:role:1",
                        "name": "Organization Administrator",
                        "description": "Built-in rights for administering an organization",
                        "bundleKey": "ROLE_ORGANIZATION_ADMINISTRATOR",
                        "readOnly": true
                    }]
                }));
            })
            .await;

        let data_source = RoleDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();
        let config = RoleState {
            org_id: Value::Value(Cow::Borrowed("urn:vcloud:org:42")),
            name: Value::Value(Cow::Borrowed("Organization Administrator")),
            ..Default::default()
        };

        let state = data_source
            .read(&mut diags, config, ValueEmpty::default())
            .await
            .expect("read should succeed");

        list.assert_async().await;
        assert_eq!(state.id.as_str(), "urn:vcloud:role:1");
        assert_eq!(state.bundle_key.as_str(), "ROLE_ORGANIZATION_ADMINISTRATOR");
        assert_eq!(state.read_only, Value::Value(true));
    }
}
