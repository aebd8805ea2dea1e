use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSpec {
    pub chapters: Vec<ChapterSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterSpec {
    pub title: String,
    pub alias: String,
    #[serde(default)]
    pub is_track: bool,
    #[serde(default)]
    pub description: String,
    pub subchapters: Vec<SubchapterSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubchapterSpec {
    pub title: String,
    pub alias: String,
}

/// Reader progress and identity, persisted as a single JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(default)]
    pub has_read: BTreeMap<String, bool>,
    #[serde(default)]
    pub user: Option<UserData>,
    #[serde(default)]
    pub skipped_auth: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub initial_load_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_track_alias: Option<String>,
}

impl ProgressState {
    pub fn has_read(&self, alias: &str) -> bool {
        self.has_read.get(alias).copied().unwrap_or(false)
    }

    /// Aliases flagged as read, in key order.
    pub fn read_aliases(&self) -> Vec<&str> {
        self.has_read
            .iter()
            .filter(|(_, read)| **read)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|user| user.project_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub email: String,
    pub name: String,
}

/// Response body of the OAuth code exchange endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthExchangeResponse {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
    #[serde(
        default,
        rename = "operationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

/// A row of the data browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserRecord {
    pub id: String,
    pub name: String,
    pub url: String,
}
