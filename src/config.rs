use anyhow::Context as _;
use url::Url;

pub const DEFAULT_INVITE_ENDPOINT: &str = "https://slack.graph.cool/invite";
pub const DEFAULT_GRAPHQL_ENDPOINT_BASE: &str = "https://api.graph.cool/simple/v1/";
pub const DEFAULT_SOURCE_BASE_URL: &str =
    "https://github.com/learnapollo/learnapollo/blob/master/content/";
pub const DEFAULT_REPOSITORY_BASE_URL: &str = "https://github.com/learnapollo/";
pub const DEFAULT_SITE_ORIGIN: &str = "http://127.0.0.1:8080";

/// Deploy-time constants. Read once at start-up and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub last_updated: String,
    pub github_oauth_client_id: String,
    pub auth_endpoint: Option<Url>,
    pub download_endpoint: Option<Url>,
    pub invite_endpoint: Url,
    pub graphql_endpoint_base: Url,
    pub source_base_url: Url,
    pub repository_base_url: Url,
    pub site_origin: Url,
    pub enable_analytics: bool,
}

impl SiteConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url_or = |key: &str, default: &str| -> anyhow::Result<Url> {
            let raw = get(key).unwrap_or_else(|| default.to_owned());
            Url::parse(&raw).with_context(|| format!("parse {key}: {raw}"))
        };
        let optional_url = |key: &str| -> anyhow::Result<Option<Url>> {
            get(key)
                .map(|raw| Url::parse(&raw).with_context(|| format!("parse {key}: {raw}")))
                .transpose()
        };

        let enable_analytics = match get("LEARNSITE_ENABLE_ANALYTICS").as_deref() {
            None | Some("0") | Some("false") | Some("no") => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some(other) => anyhow::bail!("LEARNSITE_ENABLE_ANALYTICS must be a boolean: {other}"),
        };

        Ok(Self {
            last_updated: get("LEARNSITE_LAST_UPDATED")
                .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
            github_oauth_client_id: get("LEARNSITE_GITHUB_OAUTH_CLIENT_ID").unwrap_or_default(),
            auth_endpoint: optional_url("LEARNSITE_AUTH_ENDPOINT")?,
            download_endpoint: optional_url("LEARNSITE_DOWNLOAD_ENDPOINT")?,
            invite_endpoint: url_or("LEARNSITE_INVITE_ENDPOINT", DEFAULT_INVITE_ENDPOINT)?,
            graphql_endpoint_base: with_trailing_slash(url_or(
                "LEARNSITE_GRAPHQL_ENDPOINT_BASE",
                DEFAULT_GRAPHQL_ENDPOINT_BASE,
            )?),
            source_base_url: with_trailing_slash(url_or(
                "LEARNSITE_SOURCE_BASE_URL",
                DEFAULT_SOURCE_BASE_URL,
            )?),
            repository_base_url: with_trailing_slash(url_or(
                "LEARNSITE_REPOSITORY_BASE_URL",
                DEFAULT_REPOSITORY_BASE_URL,
            )?),
            site_origin: url_or("LEARNSITE_SITE_ORIGIN", DEFAULT_SITE_ORIGIN)?,
            enable_analytics,
        })
    }

    /// GraphQL endpoint of a claimed project. The id is always one path
    /// segment under the base.
    pub fn project_endpoint(&self, project_id: &str) -> anyhow::Result<Url> {
        let mut url = self.graphql_endpoint_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                anyhow::anyhow!(
                    "build endpoint url for project {project_id}: base has no path: {}",
                    self.graphql_endpoint_base
                )
            })?
            .pop_if_empty()
            .push(project_id);
        Ok(url)
    }

    /// Absolute URL of a site route.
    pub fn site_url(&self, path: &str) -> anyhow::Result<Url> {
        self.site_origin
            .join(path)
            .with_context(|| format!("build site url for {path}"))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            last_updated: String::new(),
            github_oauth_client_id: String::new(),
            auth_endpoint: None,
            download_endpoint: None,
            invite_endpoint: parse_const(DEFAULT_INVITE_ENDPOINT),
            graphql_endpoint_base: parse_const(DEFAULT_GRAPHQL_ENDPOINT_BASE),
            source_base_url: parse_const(DEFAULT_SOURCE_BASE_URL),
            repository_base_url: parse_const(DEFAULT_REPOSITORY_BASE_URL),
            site_origin: parse_const(DEFAULT_SITE_ORIGIN),
            enable_analytics: false,
        }
    }
}

fn parse_const(raw: &str) -> Url {
    Url::parse(raw).expect("built-in url constant must parse")
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
