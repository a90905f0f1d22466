//! Catalog REST client.
//!
//! [`CatalogClient`] is the boundary the reconciler consumes; the
//! [`HttpCatalogClient`] implementation speaks the catalog's JSON API with a
//! bearer token obtained elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::data::{Draft, RemoteResource, ResourceType, Section};
use crate::error::CatalogError;
use crate::raw_data::{RawContent, RawDraftRequest, RawPlaylist, RawSearchResults};

pub type CatalogResult<T> = Result<T, CatalogError>;

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;
const STATUS_NOT_FOUND: u16 = 404;

/// Outcome of a strict name + url search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Exactly one candidate, with equal name and url.
    Match(RemoteResource),
    /// No candidate, or a single candidate that differs in name or url.
    NotFound,
    /// More than one candidate.
    Ambiguous { total: i64 },
}

impl SearchOutcome {
    /// Applies the exact-match rule to a search response.
    pub fn from_candidates(
        total: i64,
        candidates: Vec<RemoteResource>,
        name: &str,
        url: &str,
    ) -> Self {
        if total > 1 || candidates.len() > 1 {
            return Self::Ambiguous {
                total: total.max(candidates.len() as i64),
            };
        }

        if total != 1 {
            return Self::NotFound;
        }

        match candidates.into_iter().next() {
            Some(candidate) if candidate.name() == name && candidate.url() == url => {
                Self::Match(candidate)
            }
            _ => Self::NotFound,
        }
    }
}

/// Acknowledgement of a delete call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteAck {
    Deleted,
    /// The catalog no longer knew the resource.
    AlreadyAbsent,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// `None` when the catalog does not know the id.
    async fn get_by_id(
        &self,
        resource: ResourceType,
        id: i64,
    ) -> CatalogResult<Option<RemoteResource>>;

    async fn search_exact(
        &self,
        resource: ResourceType,
        name: &str,
        url: &str,
    ) -> CatalogResult<SearchOutcome>;

    async fn create(&self, draft: &Draft) -> CatalogResult<RemoteResource>;

    /// Fully overwrites the resource with `draft`.
    async fn update(&self, id: i64, draft: &Draft) -> CatalogResult<RemoteResource>;

    async fn delete(&self, resource: ResourceType, id: i64) -> CatalogResult<DeleteAck>;

    /// Replaces the section ordering of a playlist.
    async fn organize_grouping(&self, grouping_id: i64, sections: &[Section]) -> CatalogResult<()>;
}

/// Catalog client over HTTP.
pub struct HttpCatalogClient {
    base_url: String,

    token: SecretString,
    http_client: Client,
}

impl std::fmt::Debug for HttpCatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCatalogClient {
    /// Builds an authenticated client. Fails when no session can be established.
    pub fn new(base_url: &Url, token: SecretString, timeout: Duration) -> CatalogResult<Self> {
        if token.expose_secret().trim().is_empty() {
            return Err(CatalogError::Session("no access token supplied".to_owned()));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("course-catalog-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| CatalogError::Session(format!("failed to build HTTP client: {err}")))?;

        Ok(Self::with_http_client(base_url, token, http_client))
    }

    pub fn with_http_client(base_url: &Url, token: SecretString, http_client: Client) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            token,
            http_client,
        }
    }

    fn item_url(&self, resource: ResourceType, id: i64) -> String {
        match resource {
            ResourceType::Content => format!("{}/api/content/{id}", self.base_url),
            ResourceType::Playlist => format!("{}/api/playlist/{id}", self.base_url),
        }
    }

    fn collection_url(&self, resource: ResourceType) -> String {
        match resource {
            ResourceType::Content => format!("{}/api/contents", self.base_url),
            ResourceType::Playlist => format!("{}/api/playlists", self.base_url),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.token.expose_secret())
    }

    async fn send(&self, method: &str, url: &str, builder: RequestBuilder) -> CatalogResult<Response> {
        debug!(method, url, "catalog request");

        let response = self.authorized(builder).send().await?;
        debug!(method, url, status = response.status().as_u16(), "catalog response");

        Ok(response)
    }

    fn decode_resource(
        resource: ResourceType,
        body: &str,
        known_id: Option<i64>,
    ) -> CatalogResult<RemoteResource> {
        let decoded = match resource {
            ResourceType::Content => decode::<RawContent>(body)?.into_resource(known_id),
            ResourceType::Playlist => decode::<RawPlaylist>(body)?.into_resource(known_id),
        };

        decoded.ok_or_else(|| CatalogError::Decode("resource body carries no id".to_owned()))
    }

    async fn write_draft(
        &self,
        method: &str,
        url: String,
        builder: RequestBuilder,
        draft: &Draft,
        id: Option<i64>,
        expected: u16,
    ) -> CatalogResult<RemoteResource> {
        let request = RawDraftRequest { id, draft };
        let response = self.send(method, &url, builder.json(&request)).await?;
        let body = expect_status(response, expected).await?;

        Self::decode_resource(draft.resource_type(), &body, id)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_by_id(
        &self,
        resource: ResourceType,
        id: i64,
    ) -> CatalogResult<Option<RemoteResource>> {
        let url = self.item_url(resource, id);
        let response = self.send("GET", &url, self.http_client.get(&url)).await?;

        if response.status().as_u16() == STATUS_NOT_FOUND {
            return Ok(None);
        }

        let body = expect_status(response, STATUS_OK).await?;
        Self::decode_resource(resource, &body, Some(id)).map(Some)
    }

    async fn search_exact(
        &self,
        resource: ResourceType,
        name: &str,
        url: &str,
    ) -> CatalogResult<SearchOutcome> {
        let endpoint = self.collection_url(resource);
        let builder = self.http_client.get(&endpoint).query(&[("term", name)]);
        let response = self.send("GET", &endpoint, builder).await?;
        let body = expect_status(response, STATUS_OK).await?;

        let (total, candidates) = match resource {
            ResourceType::Content => {
                let page = decode::<RawSearchResults<RawContent>>(&body)?;
                let candidates = page
                    .results
                    .into_iter()
                    .filter_map(|raw| raw.into_resource(None))
                    .collect();
                (page.total, candidates)
            }
            ResourceType::Playlist => {
                let page = decode::<RawSearchResults<RawPlaylist>>(&body)?;
                let candidates = page
                    .results
                    .into_iter()
                    .filter_map(|raw| raw.into_resource(None))
                    .collect();
                (page.total, candidates)
            }
        };

        Ok(SearchOutcome::from_candidates(total, candidates, name, url))
    }

    async fn create(&self, draft: &Draft) -> CatalogResult<RemoteResource> {
        let url = self.collection_url(draft.resource_type());
        let builder = self.http_client.post(&url);

        self.write_draft("POST", url, builder, draft, None, STATUS_CREATED)
            .await
    }

    async fn update(&self, id: i64, draft: &Draft) -> CatalogResult<RemoteResource> {
        let url = self.item_url(draft.resource_type(), id);
        let builder = self.http_client.put(&url);

        self.write_draft("PUT", url, builder, draft, Some(id), STATUS_OK)
            .await
    }

    async fn delete(&self, resource: ResourceType, id: i64) -> CatalogResult<DeleteAck> {
        let url = self.item_url(resource, id);
        let response = self.send("DELETE", &url, self.http_client.delete(&url)).await?;

        if response.status().as_u16() == STATUS_NOT_FOUND {
            warn!(remote_id = id, "catalog reports resource already absent");
            return Ok(DeleteAck::AlreadyAbsent);
        }

        expect_status(response, STATUS_OK).await?;
        Ok(DeleteAck::Deleted)
    }

    async fn organize_grouping(&self, grouping_id: i64, sections: &[Section]) -> CatalogResult<()> {
        let url = format!(
            "{}/organize",
            self.item_url(ResourceType::Playlist, grouping_id)
        );
        let builder = self.http_client.put(&url).json(sections);
        let response = self.send("PUT", &url, builder).await?;

        expect_status(response, STATUS_OK).await?;
        Ok(())
    }
}

/// Reads the body, failing unless the numeric status equals `expected`.
async fn expect_status(response: Response, expected: u16) -> CatalogResult<String> {
    let code = response.status().as_u16();
    let body = response.text().await?;

    if code != expected {
        return Err(CatalogError::Status { code, body });
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(body: &str) -> CatalogResult<T> {
    serde_json::from_str(body).map_err(|err| CatalogError::Decode(err.to_string()))
}
