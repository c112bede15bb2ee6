// ─── Version Source ───
// Read-only access to Fabric meta (platform versions) and the Modrinth
// registry (package versions, search, titles).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::model::{
    PlatformVersion, ProjectResponse, RegistryVersion, SearchHit, SearchQuery, SearchResponse,
    VersionFilter,
};
use crate::core::error::{UpdaterError, UpdaterResult};

pub const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";
pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";

#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn game_versions(&self) -> UpdaterResult<Vec<PlatformVersion>>;

    async fn loader_versions(&self) -> UpdaterResult<Vec<PlatformVersion>>;

    async fn installer_versions(&self) -> UpdaterResult<Vec<PlatformVersion>>;

    /// Version listing of a project, newest first. `None` when the registry
    /// does not know the identifier.
    async fn project_versions(
        &self,
        project_id: &str,
        filter: &VersionFilter,
    ) -> UpdaterResult<Option<Vec<RegistryVersion>>>;

    async fn search(&self, query: &SearchQuery) -> UpdaterResult<Vec<SearchHit>>;

    async fn project_title(&self, project_id: &str) -> UpdaterResult<Option<String>>;
}

/// HTTP-backed [`VersionSource`].
pub struct RemoteVersionSource {
    client: Client,
    fabric_meta_base: String,
    modrinth_base: String,
}

impl RemoteVersionSource {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, FABRIC_META_BASE, MODRINTH_API_BASE)
    }

    pub fn with_endpoints(client: Client, fabric_meta_base: &str, modrinth_base: &str) -> Self {
        Self {
            client,
            fabric_meta_base: fabric_meta_base.trim_end_matches('/').to_string(),
            modrinth_base: modrinth_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> UpdaterResult<Option<T>> {
        debug!("GET {} {:?}", url, query);
        let resp = self.client.get(url).query(query).send().await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UpdaterError::RequestFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Some(resp.json::<T>().await?))
    }

    async fn platform_listing(&self, kind: &str) -> UpdaterResult<Vec<PlatformVersion>> {
        let url = format!("{}/versions/{}", self.fabric_meta_base, kind);
        self.get_json(&url, &[])
            .await?
            .ok_or(UpdaterError::RequestFailed { url, status: 404 })
    }
}

#[async_trait]
impl VersionSource for RemoteVersionSource {
    async fn game_versions(&self) -> UpdaterResult<Vec<PlatformVersion>> {
        self.platform_listing("game").await
    }

    async fn loader_versions(&self) -> UpdaterResult<Vec<PlatformVersion>> {
        self.platform_listing("loader").await
    }

    async fn installer_versions(&self) -> UpdaterResult<Vec<PlatformVersion>> {
        self.platform_listing("installer").await
    }

    async fn project_versions(
        &self,
        project_id: &str,
        filter: &VersionFilter,
    ) -> UpdaterResult<Option<Vec<RegistryVersion>>> {
        let url = format!(
            "{}/project/{}/version",
            self.modrinth_base,
            encode_path_segment(project_id)
        );
        let query = match filter {
            VersionFilter::Loader(loader) => vec![("loaders", json_list(loader))],
            VersionFilter::GameVersion(game) => vec![("game_versions", json_list(game))],
            VersionFilter::All => vec![],
        };
        self.get_json(&url, &query).await
    }

    async fn search(&self, query: &SearchQuery) -> UpdaterResult<Vec<SearchHit>> {
        let url = format!("{}/search", self.modrinth_base);
        let mut params = vec![("limit", "1".to_string())];
        match query {
            SearchQuery::Text(text) => params.push(("query", text.clone())),
            SearchQuery::Slug(slug) => params.push(("facets", facet("slug", slug))),
            SearchQuery::ProjectId(id) => params.push(("facets", facet("project_id", id))),
        }
        let resp: Option<SearchResponse> = self.get_json(&url, &params).await?;
        Ok(resp.map(|r| r.hits).unwrap_or_default())
    }

    async fn project_title(&self, project_id: &str) -> UpdaterResult<Option<String>> {
        let url = format!(
            "{}/project/{}",
            self.modrinth_base,
            encode_path_segment(project_id)
        );
        let resp: Option<ProjectResponse> = self.get_json(&url, &[]).await?;
        Ok(resp.and_then(|p| p.title).filter(|t| !t.is_empty()))
    }
}

fn json_list(value: &str) -> String {
    serde_json::json!([value]).to_string()
}

fn facet(field: &str, value: &str) -> String {
    serde_json::json!([[format!("{field}:{value}")]]).to_string()
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.trim().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> RemoteVersionSource {
        RemoteVersionSource::with_endpoints(Client::new(), &server.uri(), &server.uri())
    }

    #[test]
    fn encode_path_segment_escapes_reserved_bytes() {
        assert_eq!(encode_path_segment("fabric-api"), "fabric-api");
        assert_eq!(encode_path_segment("Mod Menu"), "Mod%20Menu");
        assert_eq!(encode_path_segment("a/b"), "a%2Fb");
    }

    #[test]
    fn facet_is_a_nested_json_array() {
        assert_eq!(facet("slug", "lithium"), r#"[["slug:lithium"]]"#);
    }

    #[tokio::test]
    async fn project_versions_sends_loader_filter_and_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/mod-a/version"))
            .and(query_param("loaders", r#"["fabric"]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"version_number": "2.0.0", "version_type": "release",
                 "game_versions": ["1.21.8"], "loaders": ["fabric"], "files": []}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/project/ghost/version"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let src = source(&server);
        let filter = VersionFilter::Loader("fabric".into());

        let versions = src.project_versions("mod-a", &filter).await.unwrap().unwrap();
        assert_eq!(versions[0].version_number, "2.0.0");
        assert!(src.project_versions("ghost", &filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn platform_listings_and_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions/game"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"version": "25w31a", "stable": false},
                {"version": "1.21.8", "stable": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/versions/loader"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let src = source(&server);
        let games = src.game_versions().await.unwrap();
        assert_eq!(games[1], PlatformVersion::new("1.21.8", true));

        let err = src.loader_versions().await.unwrap_err();
        assert!(matches!(err, UpdaterError::RequestFailed { status: 503, .. }));
    }

    #[tokio::test]
    async fn search_returns_first_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("facets", r#"[["slug:lithium"]]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hits": [{"project_id": "gvQqBUqZ", "slug": "lithium"}]
            })))
            .mount(&server)
            .await;

        let hits = source(&server)
            .search(&SearchQuery::Slug("lithium".into()))
            .await
            .unwrap();
        assert_eq!(hits[0].project_id.as_deref(), Some("gvQqBUqZ"));
    }
}
