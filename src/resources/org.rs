use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueBool, ValueEmpty, ValueString},
    AttributePath, Diagnostics, Resource,
};

use crate::client::types::Org;
use crate::client::ORGS_PATH;
use crate::provider::{configured, report, SharedClient};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrgState<'a> {
    #[serde(borrow)]
    pub id: ValueString<'a>,
    #[serde(borrow)]
    pub name: ValueString<'a>,
    #[serde(borrow)]
    pub display_name: ValueString<'a>,
    #[serde(borrow)]
    pub description: ValueString<'a>,
    pub is_enabled: ValueBool,
    pub is_classic_tenant: ValueBool,
    #[serde(borrow)]
    pub managed_by_id: ValueString<'a>,
    #[serde(borrow)]
    pub managed_by_name: ValueString<'a>,
}

impl OrgState<'_> {
    /// Copy the server view of the organization into the state.
    pub fn refresh(&mut self, org: Org) {
        self.id = Value::Value(Cow::Owned(org.id));
        self.name = Value::Value(Cow::Owned(org.name));
        self.display_name = Value::Value(Cow::Owned(org.display_name));
        // An unset description reads back as "".
        if !(org.description.is_empty() && self.description.is_null()) {
            self.description = Value::Value(Cow::Owned(org.description));
        }
        self.is_enabled = Value::Value(org.is_enabled);
        self.is_classic_tenant = Value::Value(org.is_classic_tenant);
        let managed_by = org.managed_by.unwrap_or_default();
        self.managed_by_id = Value::Value(Cow::Owned(managed_by.id));
        self.managed_by_name = Value::Value(Cow::Owned(managed_by.name));
    }

    /// Attributes left out of the configuration fall back to their defaults,
    /// even when the prior state holds another value.
    pub fn apply_defaults(&mut self, config: &OrgState<'_>) {
        if config.is_enabled.is_null() {
            self.is_enabled = Value::Value(true);
        }
        if config.is_classic_tenant.is_null() {
            self.is_classic_tenant = Value::Value(false);
        }
    }

    pub fn to_org(&self) -> Org {
        Org {
            id: self.id.as_ref_option().map(|id| id.to_string()).unwrap_or_default(),
            name: self.name.as_str().to_string(),
            display_name: self.display_name.as_str().to_string(),
            description: self.description.as_str().to_string(),
            is_enabled: self.is_enabled.unwrap_or(true),
            is_classic_tenant: self.is_classic_tenant.unwrap_or(false),
            managed_by: None,
        }
    }
}

pub struct OrgResource {
    client: SharedClient,
}

impl OrgResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for OrgResource {
    type State<'a> = OrgState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Manages a VCFA organization"),
                attributes: map! {
                    "id" => Attribute {
                        description: Description::plain("Organization URN"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        description: Description::plain("Organization name, used in URLs"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "display_name" => Attribute {
                        description: Description::plain("Human readable organization name"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        description: Description::plain("Organization description"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "is_enabled" => Attribute {
                        description: Description::plain("Whether the organization is enabled (default: true)"),
                        attr_type: AttributeType::Bool,
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "is_classic_tenant" => Attribute {
                        description: Description::plain("Create a classic tenant organization (default: false). Changing it replaces the organization"),
                        attr_type: AttributeType::Bool,
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "managed_by_id" => Attribute {
                        description: Description::plain("URN of the managing organization"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "managed_by_name" => Attribute {
                        description: Description::plain("Name of the managing organization"),
                        attr_type: AttributeType::String,
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;
        let path = format!("{ORGS_PATH}/{}", state.id.as_str());

        let org: Org = match client.get(&path, None).await {
            Ok(o) => o,
            Err(e) if e.is_not_found() => {
                diags.root_error(
                    format!("Organization {} no longer exists", state.id.as_str()),
                    "Remove it from the Terraform state with `terraform state rm` to recreate it",
                );
                return None;
            }
            Err(e) => {
                report(diags, "Failed to read organization", &e);
                return None;
            }
        };

        let mut state = state;
        state.refresh(org);
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.apply_defaults(&config_state);
        // Computed by the server on create
        state.id = Value::Unknown;
        state.managed_by_id = Value::Unknown;
        state.managed_by_name = Value::Unknown;

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.apply_defaults(&config_state);

        let mut trigger_replace = vec![];
        if state.is_classic_tenant != prior_state.is_classic_tenant {
            trigger_replace.push(AttributePath::new("is_classic_tenant"));
        }

        state.id = prior_state.id;
        state.managed_by_id = prior_state.managed_by_id;
        state.managed_by_name = prior_state.managed_by_name;

        Some((state, Default::default(), trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;

        let org: Org = match client.create(ORGS_PATH, &planned_state.to_org(), None).await {
            Ok(o) => o,
            Err(e) => {
                report(diags, "Failed to create organization", &e);
                return None;
            }
        };
        tracing::info!(id = %org.id, name = %org.name, "created organization");

        let mut state = planned_state;
        state.refresh(org);
        Some((state, Default::default()))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;
        let path = format!("{ORGS_PATH}/{}", prior_state.id.as_str());

        let mut body = planned_state.to_org();
        body.id = prior_state.id.as_str().to_string();

        let org: Org = match client.update(&path, &body, None).await {
            Ok(o) => o,
            Err(e) => {
                report(diags, "Failed to update organization", &e);
                return None;
            }
        };

        let mut state = planned_state;
        state.refresh(org);
        Some((state, Default::default()))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = configured(&self.client, diags).await?;
        let path = format!("{ORGS_PATH}/{}", prior_state.id.as_str());

        let mut org: Org = match client.get(&path, None).await {
            Ok(o) => o,
            Err(e) if e.is_not_found() => return Some(()),
            Err(e) => {
                report(diags, "Failed to read organization", &e);
                return None;
            }
        };

        // Enabled organizations cannot be deleted.
        if org.is_enabled {
            org.is_enabled = false;
            if let Err(e) = client.update::<_, Org>(&path, &org, None).await {
                report(diags, "Failed to disable organization", &e);
                return None;
            }
        }

        let query = [("force", "true".to_string()), ("recursive", "true".to_string())];
        match client.delete(&path, &query, None).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                report(diags, "Failed to delete organization", &e);
                return None;
            }
        }

        tracing::info!(id = %prior_state.id, "deleted organization");
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;

        let found = if id.starts_with("urn:vcloud:org:") {
            client.get(&format!("{ORGS_PATH}/{id}"), None).await
        } else {
            client.get_by_name("organization", ORGS_PATH, &id, None).await
        };
        let org: Org = match found {
            Ok(o) => o,
            Err(e) => {
                report(diags, "Failed to import organization", &e);
                return None;
            }
        };

        let mut state = OrgState::default();
        state.refresh(org);
        Some((state, Default::default()))
    }
}
