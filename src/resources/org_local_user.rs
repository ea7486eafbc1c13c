use std::borrow::Cow;
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueSet, ValueString},
    AttributePath, Diagnostics, Resource,
};

use crate::client::types::{EntityRef, Org, User};
use crate::client::{ORGS_PATH, USERS_PATH};
use crate::provider::{configured, report, SharedClient};
use crate::util::split_import_id;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrgLocalUserState<'a> {
    #[serde(borrow)]
    pub id: ValueString<'a>,
    #[serde(borrow)]
    pub org_id: ValueString<'a>,
    #[serde(borrow)]
    pub username: ValueString<'a>,
    #[serde(borrow)]
    pub password: ValueString<'a>,
    #[serde(borrow)]
    pub role_ids: ValueSet<ValueString<'a>>,
}

impl OrgLocalUserState<'_> {
    /// Copy the server view of the user into the state. The password is never returned.
    pub fn refresh(&mut self, user: User) {
        self.id = Value::Value(Cow::Owned(user.id));
        self.username = Value::Value(Cow::Owned(user.username));
        if let Some(org) = user.org_entity_ref.filter(|org| !org.id.is_empty()) {
            self.org_id = Value::Value(Cow::Owned(org.id));
        }
        self.role_ids = Value::Value(
            user.role_entity_refs
                .into_iter()
                .map(|role| Value::Value(Cow::Owned(role.id)))
                .collect(),
        );
    }

    pub fn role_refs(&self) -> Vec<EntityRef> {
        self.role_ids
            .iter()
            .flatten()
            .filter_map(|id| id.as_ref_option())
            .map(|id| EntityRef::id(id.to_string()))
            .collect()
    }

    pub fn to_user(&self, with_password: bool) -> User {
        User {
            id: self.id.as_ref_option().map(|id| id.to_string()).unwrap_or_default(),
            username: self.username.as_str().to_string(),
            password: with_password.then(|| self.password.as_str().to_string()),
            role_entity_refs: self.role_refs(),
            org_entity_ref: Some(EntityRef::id(self.org_id.as_str())),
            provider_type: "LOCAL".to_string(),
            enabled: true,
        }
    }
}

pub struct OrgLocalUserResource {
    client: SharedClient,
}

impl OrgLocalUserResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for OrgLocalUserResource {
    type State<'a> = OrgLocalUserState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Manages a local user of a VCFA organization"),
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
                    "password" => Attribute {
                        description: Description::plain("Password of the user"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Required,
                        sensitive: true,
                        ..Default::default()
                    },
                    "role_ids" => Attribute {
                        description: Description::plain("URNs of the roles granted to the user"),
                        attr_type: AttributeType::Set(Box::new(AttributeType::String)),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    }
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(org_id) = &config.org_id {
            if !org_id.starts_with("urn:vcloud:org:") {
                diags.error_short(
                    format!("org_id must be an organization URN, got '{org_id}'"),
                    AttributePath::new("org_id"),
                );
            }
        }
        if let Value::Value(roles) = &config.role_ids {
            if roles.is_empty() {
                diags.error_short(
                    "role_ids must name at least one role",
                    AttributePath::new("role_ids"),
                );
            }
        }
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;
        let path = format!("{USERS_PATH}/{}", state.id.as_str());

        let user: User = match client.get(&path, Some(state.org_id.as_str())).await {
            Ok(u) => u,
            Err(e) if e.is_not_found() => {
                diags.root_error(
                    format!("User {} no longer exists", state.id.as_str()),
                    "Remove it from the Terraform state with `terraform state rm` to recreate it",
                );
                return None;
            }
            Err(e) => {
                report(diags, "Failed to read user", &e);
                return None;
            }
        };

        let mut state = state;
        state.refresh(user);
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut trigger_replace = vec![];
        if proposed_state.org_id != prior_state.org_id {
            trigger_replace.push(AttributePath::new("org_id"));
        }
        if proposed_state.username != prior_state.username {
            trigger_replace.push(AttributePath::new("username"));
        }

        let mut state = proposed_state;
        state.id = prior_state.id;
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
        let tenant = planned_state.org_id.as_str().to_string();

        let user: User = match client
            .create(USERS_PATH, &planned_state.to_user(true), Some(&tenant))
            .await
        {
            Ok(u) => u,
            Err(e) => {
                report(diags, "Failed to create user", &e);
                return None;
            }
        };
        tracing::info!(id = %user.id, username = %user.username, "created local user");

        let mut state = planned_state;
        state.refresh(user);
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
        let tenant = planned_state.org_id.as_str().to_string();
        let path = format!("{USERS_PATH}/{}", prior_state.id.as_str());

        let password_changed = planned_state.password != prior_state.password;
        let mut body = planned_state.to_user(password_changed);
        body.id = prior_state.id.as_str().to_string();

        let user: User = match client.update(&path, &body, Some(&tenant)).await {
            Ok(u) => u,
            Err(e) => {
                report(diags, "Failed to update user", &e);
                return None;
            }
        };

        let mut state = planned_state;
        state.refresh(user);
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
        let path = format!("{USERS_PATH}/{}", prior_state.id.as_str());

        match client
            .delete(&path, &[], Some(prior_state.org_id.as_str()))
            .await
        {
            Ok(()) => Some(()),
            Err(e) if e.is_not_found() => Some(()),
            Err(e) => {
                report(diags, "Failed to delete user", &e);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = configured(&self.client, diags).await?;

        let parts = match split_import_id(&id, client.import_separator(), &["org", "username"]) {
            Ok(p) => p,
            Err(e) => {
                diags.root_error_short(e);
                return None;
            }
        };
        let (org_name, username) = (parts[0], parts[1]);

        let org: Org = match client
            .get_by_name("organization", ORGS_PATH, org_name, None)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                report(diags, "Failed to import user", &e);
                return None;
            }
        };
        let user: User = match client
            .find_one("user", USERS_PATH, "username", username, Some(&org.id))
            .await
        {
            Ok(u) => u,
            Err(e) => {
                report(diags, "Failed to import user", &e);
                return None;
            }
        };

        let mut state = OrgLocalUserState {
            org_id: Value::Value(Cow::Owned(org.id)),
            role_ids: Value::Value(BTreeSet::new()),
            ..Default::default()
        };
        state.refresh(user);
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_client;
    use httpmock::prelude::*;
    use serde_json::json;

    const ORG_ID: &str = "urn:vcloud:org:42";

    fn user_json() -> serde_json::Value {
        json!({
            "id": "urn:vcloud:user:7",
            "username": "alice",
            "roleEntityRefs": [{"id": "urn:vcloud:role:1", "name": "Organization Administrator"}],
            "orgEntityRef": {"id": ORG_ID, "name": "acme"},
            "providerType": "LOCAL",
            "enabled": true
        })
    }

    fn proposed<'a>() -> OrgLocalUserState<'a> {
        OrgLocalUserState {
            org_id: Value::Value(Cow::Borrowed(ORG_ID)),
            username: Value::Value(Cow::Borrowed("alice")),
            password: Value::Value(Cow::Borrowed("s3cret")),
            role_ids: Value::Value(BTreeSet::from([Value::Value(Cow::Borrowed(
                "urn:vcloud:role:1",
            ))])),
            ..Default::default()
        }
    }

    #[test]
    fn password_is_sensitive() {
        let resource = OrgLocalUserResource::new(SharedClient::default());
        let mut diags = Diagnostics::default();
        let schema = resource.schema(&mut diags).expect("schema should exist");

        assert!(schema.block.attributes["password"].sensitive);
        assert!(matches!(
            schema.block.attributes["role_ids"].attr_type,
            AttributeType::Set(_)
        ));
    }

    #[test]
    fn to_user_omits_unchanged_password() {
        let user = proposed().to_user(false);

        assert!(user.password.is_none());
        assert_eq!(user.provider_type, "LOCAL");
        assert_eq!(user.role_entity_refs, vec![EntityRef::id("urn:vcloud:role:1")]);
        assert_eq!(user.org_entity_ref, Some(EntityRef::id(ORG_ID)));
    }

    #[tokio::test]
    async fn validate_rejects_bad_org_id_and_empty_roles() {
        let resource = OrgLocalUserResource::new(SharedClient::default());
        let mut diags = Diagnostics::default();

        let config = OrgLocalUserState {
            org_id: Value::Value(Cow::Borrowed("acme")),
            role_ids: Value::Value(BTreeSet::new()),
            ..proposed()
        };
        resource.validate(&mut diags, config).await;

        assert_eq!(diags.errors.len(), 2);
    }

    #[tokio::test]
    async fn validate_accepts_unknown_values() {
        let resource = OrgLocalUserResource::new(SharedClient::default());
        let mut diags = Diagnostics::default();

        let config = OrgLocalUserState {
            org_id: Value::Unknown,
            role_ids: Value::Unknown,
            ..proposed()
        };
        resource.validate(&mut diags, config).await;

        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn plan_update_replaces_on_username_change() {
        let resource = OrgLocalUserResource::new(SharedClient::default());
        let mut diags = Diagnostics::default();

        let mut prior = proposed();
        prior.id = Value::Value(Cow::Borrowed("urn:vcloud:user:7"));
        let mut next = proposed();
        next.username = Value::Value(Cow::Borrowed("bob"));

        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                next.clone(),
                next,
                ValueEmpty::default(),
                ValueEmpty::default(),
            )
            .await
            .unwrap();

        assert_eq!(replace, vec![AttributePath::new("username")]);
        assert_eq!(state.id.as_str(), "urn:vcloud:user:7");
    }

    #[tokio::test]
    async fn create_posts_user_in_tenant_context() {
        let server = MockServer::start_async().await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/cloudapi/1.0.0/users")
                    .header("X-VMWARE-VCLOUD-TENANT-CONTEXT", "42")
                    .json_body_partial(
                        r#"{"username": "alice", "password": "s3cret", "providerType": "LOCAL"}"#,
                    );
                then.status(201).json_body(user_json());
            })
            .await;

        let resource = OrgLocalUserResource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .create(
                &mut diags,
                proposed(),
                proposed(),
                ValueEmpty::default(),
                ValueEmpty::default(),
            )
            .await
            .expect("create should succeed");

        post.assert_async().await;
        assert_eq!(state.id.as_str(), "urn:vcloud:user:7");
        assert_eq!(state.password.as_str(), "s3cret");
    }

    fn existing<'a>() -> OrgLocalUserState<'a> {
        OrgLocalUserState {
            id: Value::Value(Cow::Borrowed("urn:vcloud:user:7")),
            ..proposed()
        }
    }

    #[tokio::test]
    async fn update_roles_keeps_password_out_of_request() {
        let server = MockServer::start_async().await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/cloudapi/1.0.0/users/urn:vcloud:user:7")
                    .header("X-VMWARE-VCLOUD-TENANT-CONTEXT", "42")
                    .json_body(json!({
                        "id": "urn:vcloud:user:7",
                        "username": "alice",
                        "roleEntityRefs": [
                            {"id": "urn:vcloud:role:1"},
                            {"id": "urn:vcloud:role:2"}
                        ],
                        "orgEntityRef": {"id": ORG_ID},
                        "providerType": "LOCAL",
                        "enabled": true
                    }));
                then.status(200).json_body(json!({
                    "id": "urn:vcloud:user:7",
                    "username": "alice",
                    "roleEntityRefs": [
                        {"id": "urn:vcloud:role:1"},
                        {"id": "urn:vcloud:role:2"}
                    ],
                    "orgEntityRef": {"id": ORG_ID},
                    "providerType": "LOCAL"
                }));
            })
            .await;

        let resource = OrgLocalUserResource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let mut planned = existing();
        planned.role_ids = Value::Value(BTreeSet::from([
            Value::Value(Cow::Borrowed("urn:vcloud:role:1")),
            Value::Value(Cow::Borrowed("urn:vcloud:role:2")),
        ]));
        let (state, _) = resource
            .update(
                &mut diags,
                existing(),
                planned.clone(),
                planned,
                ValueEmpty::default(),
                ValueEmpty::default(),
            )
            .await
            .unwrap_or_else(|| panic!("update should succeed: {:?}", diags.errors));

        put.assert_async().await;
        assert_eq!(state.role_refs().len(), 2);
        assert_eq!(state.password.as_str(), "s3cret");
    }

    #[tokio::test]
    async fn update_sends_changed_password() {
        let server = MockServer::start_async().await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/cloudapi/1.0.0/users/urn:vcloud:user:7")
                    .json_body_partial(r#"{"username": "alice", "password": "n3w-secret"}"#);
                then.status(200).json_body(user_json());
            })
            .await;

        let resource = OrgLocalUserResource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let planned = OrgLocalUserState {
            password: Value::Value(Cow::Borrowed("n3w-secret")),
            ..existing()
        };
        let (state, _) = resource
            .update(
                &mut diags,
                existing(),
                planned.clone(),
                planned,
                ValueEmpty::default(),
                ValueEmpty::default(),
            )
            .await
            .unwrap_or_else(|| panic!("update should succeed: {:?}", diags.errors));

        put.assert_async().await;
        assert_eq!(state.password.as_str(), "n3w-secret");
    }

    #[tokio::test]
    async fn import_resolves_org_and_username() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cloudapi/1.0.0/orgs")
                    .query_param("filter", "name==acme");
                then.status(200).json_body(json!({
                    "resultTotal": 1, "pageCount": 1,
                    "values": [{"id": ORG_ID, "name": "acme"}]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cloudapi/1.0.0/users")
                    .query_param("filter", "username==alice");
                then.status(200).json_body(json!({
                    "resultTotal": 1, "pageCount": 1, "values": [user_json()]
                }));
            })
            .await;

        let resource = OrgLocalUserResource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .import(&mut diags, "acme.alice".to_string())
            .await
            .expect("import should succeed");

        assert_eq!(state.org_id.as_str(), ORG_ID);
        assert_eq!(state.role_refs(), vec![EntityRef::id("urn:vcloud:role:1")]);
        assert!(state.password.is_null());
    }

    #[tokio::test]
    async fn import_rejects_malformed_id() {
        let server = MockServer::start_async().await;
        let resource = OrgLocalUserResource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let result = resource.import(&mut diags, "alice".to_string()).await;

        assert!(result.is_none());
        assert!(diags.errors[0].summary.contains("org.username"));
    }
}
