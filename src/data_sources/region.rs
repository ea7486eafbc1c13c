use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueBool, ValueEmpty, ValueList, ValueString},
    DataSource, Diagnostics,
};

use crate::client::types::Region;
use crate::client::REGIONS_PATH;
use crate::provider::{configured, report, SharedClient};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegionState<'a> {
    #[serde(borrow)]
    pub id: ValueString<'a>,
    #[serde(borrow)]
    pub name: ValueString<'a>,
    #[serde(borrow)]
    pub description: ValueString<'a>,
    #[serde(borrow)]
    pub nsx_manager_id: ValueString<'a>,
    #[serde(borrow)]
    pub supervisor_ids: ValueList<ValueString<'a>>,
    #[serde(borrow)]
    pub storage_policy_names: ValueList<ValueString<'a>>,
    pub is_enabled: ValueBool,
    #[serde(borrow)]
    pub status: ValueString<'a>,
}

impl RegionState<'_> {
    pub fn refresh(&mut self, region: Region) {
        self.id = Value::Value(Cow::Owned(region.id));
        self.description = Value::Value(Cow::Owned(region.description));
        self.nsx_manager_id = region
            .nsx_manager
            .map(|nsx| Value::Value(Cow::Owned(nsx.id)))
            .unwrap_or(Value::Null);
        self.supervisor_ids = Value::Value(
            region
                .supervisors
                .into_iter()
                .map(|s| Value::Value(Cow::Owned(s.id)))
                .collect(),
        );
        self.storage_policy_names = Value::Value(
            region
                .storage_policies
                .into_iter()
                .map(|p| Value::Value(Cow::Owned(p)))
                .collect(),
        );
        self.is_enabled = Value::Value(region.is_enabled);
        self.status = Value::Value(Cow::Owned(region.status));
    }
}

pub struct RegionDataSource {
    client: SharedClient,
}

impl RegionDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for RegionDataSource {
    type State<'a> = RegionState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let computed = |description: &str, attr_type: AttributeType| Attribute {
            description: Description::plain(description),
            attr_type,
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        };
        let strings = || AttributeType::List(Box::new(AttributeType::String));

        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Reads a VCFA region by name"),
                attributes: map! {
                    "name" => Attribute {
                        description: Description::plain("Region name"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "id" => computed("Region URN", AttributeType::String),
                    "description" => computed("Region description", AttributeType::String),
                    "nsx_manager_id" => computed("URN of the NSX manager backing the region", AttributeType::String),
                    "supervisor_ids" => computed("URNs of the supervisors in the region", strings()),
                    "storage_policy_names" => computed("Storage policies available in the region", strings()),
                    "is_enabled" => computed("Whether the region is enabled", AttributeType::Bool),
                    "status" => computed("Realization status of the region", AttributeType::String)
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

        let region: Region = match client
            .get_by_name("region", REGIONS_PATH, config.name.as_str(), None)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                report(diags, "Failed to read region", &e);
                return None;
            }
        };

        let mut state = config;
        state.refresh(region);
        Some(state)
    }
}
