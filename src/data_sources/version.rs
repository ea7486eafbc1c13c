use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueBool, ValueEmpty, ValueList, ValueString},
    AttributePath, DataSource, Diagnostics,
};

use crate::client::types::SupportedVersions;
use crate::client::VERSIONS_PATH;
use crate::provider::{configured, report, SharedClient};
use crate::util::{compare_versions, VersionCondition};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VersionState<'a> {
    #[serde(borrow)]
    pub condition: ValueString<'a>,
    pub fail_if_not_match: ValueBool,
    pub matches_condition: ValueBool,
    #[serde(borrow)]
    pub api_version: ValueString<'a>,
    #[serde(borrow)]
    pub supported_versions: ValueList<ValueString<'a>>,
}

/// Non-deprecated versions, oldest first.
pub fn active_versions(versions: SupportedVersions) -> Vec<String> {
    let mut active: Vec<String> = versions
        .version_info
        .into_iter()
        .filter(|v| !v.deprecated)
        .map(|v| v.version)
        .collect();
    active.sort_by(|a, b| compare_versions(a, b).unwrap_or_else(|| a.cmp(b)));
    active.dedup();
    active
}

pub struct VersionDataSource {
    client: SharedClient,
}

impl VersionDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for VersionDataSource {
    type State<'a> = VersionState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Reads the API versions supported by the VCFA endpoint",
                ),
                attributes: map! {
                    "condition" => Attribute {
                        description: Description::plain("Condition checked against api_version, e.g. '>= 40.0'"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "fail_if_not_match" => Attribute {
                        description: Description::plain("Fail when the condition does not match"),
                        attr_type: AttributeType::Bool,
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "matches_condition" => Attribute {
                        description: Description::plain("Whether api_version satisfies the condition"),
                        attr_type: AttributeType::Bool,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "api_version" => Attribute {
                        description: Description::plain("Highest non-deprecated API version"),
                        attr_type: AttributeType::String,
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "supported_versions" => Attribute {
                        description: Description::plain("Non-deprecated API versions, oldest first"),
                        attr_type: AttributeType::List(Box::new(AttributeType::String)),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    }
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(condition) = &config.condition {
            if let Err(e) = VersionCondition::parse(condition) {
                diags.error_short(e, AttributePath::new("condition"));
            }
        }
        if config.fail_if_not_match == Value::Value(true) && config.condition.is_null() {
            diags.error_short(
                "fail_if_not_match requires a condition",
                AttributePath::new("fail_if_not_match"),
            );
        }
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = configured(&self.client, diags).await?;

        let versions: SupportedVersions = match client.get(VERSIONS_PATH, None).await {
            Ok(v) => v,
            Err(e) => {
                report(diags, "Failed to read supported API versions", &e);
                return None;
            }
        };
        let active = active_versions(versions);
        let Some(api_version) = active.last().cloned() else {
            diags.root_error_short("The endpoint reports no supported API version");
            return None;
        };

        let mut state = config;
        state.matches_condition = Value::Null;
        if let Value::Value(condition) = &state.condition {
            let condition = match VersionCondition::parse(condition) {
                Ok(c) => c,
                Err(e) => {
                    diags.error_short(e, AttributePath::new("condition"));
                    return None;
                }
            };
            let matches = condition.matches(&api_version).unwrap_or(false);
            if !matches && state.fail_if_not_match.unwrap_or(false) {
                diags.root_error_short(format!(
                    "API version {api_version} does not match condition '{}'",
                    state.condition.as_str()
                ));
                return None;
            }
            state.matches_condition = Value::Value(matches);
        }

        tracing::debug!(%api_version, "read VCFA API version");
        state.api_version = Value::Value(Cow::Owned(api_version));
        state.supported_versions = Value::Value(
            active
                .into_iter()
                .map(|v| Value::Value(Cow::Owned(v)))
                .collect(),
        );
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::VersionInfo;
    use crate::testing::mock_client;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn versions_server() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/versions");
                then.status(200).json_body(json!({
                    "versionInfo": [
                        {"version": "40.0", "deprecated": false},
                        {"version": "39.1", "deprecated": false},
                        {"version": "41.0", "deprecated": true}
                    ]
                }));
            })
            .await;
        server
    }

    #[test]
    fn active_versions_skips_deprecated_and_sorts() {
        let versions = SupportedVersions {
            version_info: vec![
                VersionInfo {
                    version: "40.0".to_string(),
                    deprecated: false,
                },
                VersionInfo {
                    version: "9.1".to_string(),
                    deprecated: false,
                },
                VersionInfo {
                    version: "38.0".to_string(),
                    deprecated: true,
                },
            ],
        };

        assert_eq!(active_versions(versions), ["9.1", "40.0"]);
    }

    #[tokio::test]
    async fn read_without_condition() {
        let server = versions_server().await;
        let data_source = VersionDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let state = data_source
            .read(&mut diags, VersionState::default(), ValueEmpty::default())
            .await
            .expect("read should succeed");

        assert_eq!(state.api_version.as_str(), "40.0");
        assert!(state.matches_condition.is_null());
        assert_eq!(
            state.supported_versions.as_ref_option().map(Vec::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn read_evaluates_condition() {
        let server = versions_server().await;
        let data_source = VersionDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let config = VersionState {
            condition: Value::Value(Cow::Borrowed(">= 41.0")),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, ValueEmpty::default())
            .await
            .expect("read should succeed");

        assert_eq!(state.matches_condition, Value::Value(false));
    }

    #[tokio::test]
    async fn read_fails_on_mismatch_when_asked() {
        let server = versions_server().await;
        let data_source = VersionDataSource::new(mock_client(&server).await);
        let mut diags = Diagnostics::default();

        let config = VersionState {
            condition: Value::Value(Cow::Borrowed("< 40")),
            fail_if_not_match: Value::Value(true),
            ..Default::default()
        };
        let result = data_source
            .read(&mut diags, config, ValueEmpty::default())
            .await;

        assert!(result.is_none());
        assert!(diags.errors[0].summary.contains("does not match"));
    }

    #[tokio::test]
    async fn validate_requires_condition_for_fail_if_not_match() {
        let data_source = VersionDataSource::new(SharedClient::default());
        let mut diags = Diagnostics::default();

        let config = VersionState {
            fail_if_not_match: Value::Value(true),
            ..Default::default()
        };
        data_source.validate(&mut diags, config).await;

        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn validate_rejects_malformed_condition() {
        let data_source = VersionDataSource::new(SharedClient::default());
        let mut diags = Diagnostics::default();

        let config = VersionState {
            condition: Value::Value(Cow::Borrowed("newer than 40")),
            ..Default::default()
        };
        data_source.validate(&mut diags, config).await;

        assert_eq!(diags.errors.len(), 1);
    }
}
