use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueSet, ValueString},
    DataSource, Diagnostics,
};

use crate::client::types::User;
use crate::client::USERS_PATH;
use crate::provider::{configured, report, SharedClient};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrgLocalUserDataState<'a> {
    #[serde(borrow)]
    pub id: ValueString<'a>,
    #[serde(borrow)]
    pub org_id: ValueString<'a>,
    #[serde(borrow)]
    pub username: ValueString<'a>,
    #[serde(borrow)]
    pub role_ids: ValueSet<ValueString<'a>>,
}

pub struct OrgLocalUserDataSource {
    client: SharedClient,
}

impl OrgLocalUserDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for OrgLocalUserDataSource {
    type State<'a> = OrgLocalUserDataState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Reads a local user of a VCFA organization"),
                attributes: map! {
                    "id" => Attribute {
                        description: Description::plain("User URN"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "org_id" => Attribute {
                        description: Description::plain("URN of the organization owning the user"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "username" => Attribute {
                        description: Description::plain("Login name of the user"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "role_ids" => Attribute {
                        description: Description::plain("URNs of the roles granted to the user"),
                        attr_type: AttributeType::Set(Box::new(AttributeType::String)),
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

        let user: User = match client
            .find_one(
                "user",
                USERS_PATH,
                "username",
                config.username.as_str(),
                Some(config.org_id.as_str()),
            )
            .await
        {
            Ok(u) => u,
            Err(e) => {
                report(diags, "Failed to read user", &e);
                return None;
            }
        };

        let mut state = config;
        state.id = Value::Value(Cow::Owned(user.id));
        state.role_ids = Value::Value(
            user.role_entity_refs
                .into_iter()
                .map(|role| Value::Value(Cow::Owned(role.id)))
                .collect(),
        );
        Some(state)
    }
}
