use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth;
use crate::config::{Credentials, load_config};
use crate::contacts::{Contact, parse_contacts};
use crate::dws::{DataQuery, DataTable, parse_table};
use crate::error::{Error, Result};
use crate::events::{Event, Geolocation, most_recent_position, parse_events};
use crate::identifier::Identifier;
use crate::item_tree::{Item, ParsedTree, SubItem, parse_detailed_tree, parse_subitems};
use crate::util::append_query;
use crate::uuid_index::UuidIndex;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base registry URL, typically `https://registry.o2a-data.de/rest/v2`.
    pub registry_url: String,
    /// Base data-web-service URL, typically `https://dashboard.awi.de/data/rest`.
    pub dws_url: String,
    /// Optional account credentials for authenticated registry access.
    pub credentials: Option<Credentials>,
}

/// Blocking client for the O2A registry and data web service.
///
/// All operations are synchronous single-pass fetches followed by a pure
/// parse; the client keeps no state across calls beyond its configuration
/// and an optional session token.
#[derive(Debug, Clone)]
pub struct Client {
    registry_url: String,
    dws_url: String,
    credentials: Option<Credentials>,
    auth_token: Option<String>,

    timeout: Duration,
    progress: bool,

    http: HttpClient,
}

/// A full registry item record with its attached item properties.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    /// The item document exactly as served.
    pub item: Value,
    /// Records from `/items/{id}/properties`.
    pub item_properties: Vec<Value>,
}

/// A parameter listing entry from `/items/{id}/parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    /// Fully qualified `item.code:shortName` urn, filled in by the client.
    #[serde(default)]
    pub urn: String,
}

/// A resource attached to an item (documents, sensor descriptions, ...).
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// External linkage, or the registry payload URL when none is set.
    pub link: String,
}

impl Client {
    /// Creates a client against the production services using environment
    /// variables and/or an `.o2arc` credentials file.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `registry_url` / `dws_url` arguments
    /// - environment variables `O2A_REGISTRY_URL` / `O2A_DWS_URL`
    /// - the built-in production endpoints
    pub fn new(registry_url: Option<String>, dws_url: Option<String>) -> Result<Self> {
        Self::with_config(load_config(registry_url, dws_url)?)
    }

    /// Creates a client from an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("o2a-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("o2a-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            registry_url: config.registry_url.trim_end_matches('/').to_string(),
            dws_url: config.dws_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            auth_token: None,
            timeout: Duration::from_secs(60),
            progress: true,
            http,
        })
    }

    /// Sets the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Toggles the download progress spinner.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Logs in with the configured credentials and keeps the session token
    /// for subsequent requests. Anonymous read access works without this.
    pub fn login(mut self) -> Result<Self> {
        let credentials = self.credentials.clone().ok_or(Error::MissingConfig(
            "credentials (set O2A_CREDENTIALS or create .o2arc)",
        ))?;
        let token = auth::login(&self.http, &self.registry_url, &credentials)?;
        self.auth_token = Some(token);
        Ok(self)
    }

    // ---- transport -------------------------------------------------------

    /// Fetches a JSON document. Non-success statuses become
    /// [`Error::Transport`] and are propagated immediately, never retried.
    pub fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.send(url)?;
        let text = response.text()?;
        serde_json::from_str(&text).map_err(|source| Error::Json {
            context: url.to_string(),
            source,
        })
    }

    /// Fetches a raw payload, e.g. machine-readable sensor descriptions or
    /// the tab-separated data stream. Same failure contract as
    /// [`Client::fetch_json`].
    pub fn fetch_raw(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url)?;
        Ok(response.bytes()?.to_vec())
    }

    fn send(&self, url: &str) -> Result<Response> {
        debug!("GET {url}");
        let mut request = self.http.get(url).timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.header(auth::AUTH_HEADER, token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    // ---- registry --------------------------------------------------------

    /// Full item record including its item properties.
    pub fn item(&self, id: impl Into<Identifier>) -> Result<ItemRecord> {
        let item = self.lookup_item(&id.into())?;
        let numeric = record_id(&item)?;

        let url = self.registry(&format!("/items/{numeric}/properties"));
        let item_properties = records(self.fetch_json(&url)?);

        Ok(ItemRecord {
            item,
            item_properties,
        })
    }

    /// Fetches an item's detailed tree (nested sensor outputs, measurement
    /// properties, child items) and parses it into normalized items plus a
    /// flat urn -> parameter map.
    pub fn detailed_tree(&self, id: impl Into<Identifier>) -> Result<ParsedTree> {
        let (_, raw) = self.fetch_detailed(id)?;
        let index = UuidIndex::build(&raw);
        parse_detailed_tree(std::slice::from_ref(&raw), &index)
    }

    /// Resolves a code or id to its fully dereferenced [`Item`].
    pub fn resolve_item(&self, id: impl Into<Identifier>) -> Result<Item> {
        let (url, raw) = self.fetch_detailed(id)?;
        let index = UuidIndex::build(&raw);
        let mut tree = parse_detailed_tree(std::slice::from_ref(&raw), &index)?;
        tree.items.pop().ok_or(Error::EmptyResult { url })
    }

    /// All parameters attached to an item. Each record's `urn` is the item
    /// code joined with the parameter short name.
    pub fn parameters(&self, id: impl Into<Identifier>) -> Result<Vec<ParameterRecord>> {
        let item = self.lookup_item(&id.into())?;
        let numeric = record_id(&item)?;
        let item_code = item
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let url = self.registry(&format!("/items/{numeric}/parameters"));
        let mut parameters = Vec::new();
        for record in records(self.fetch_json(&url)?) {
            let mut record: ParameterRecord =
                serde_json::from_value(record).map_err(|source| Error::Json {
                    context: url.clone(),
                    source,
                })?;
            record.urn = format!("{}:{}", item_code, record.short_name);
            parameters.push(record);
        }
        Ok(parameters)
    }

    /// All events of an item. With `geo` set, only events inside the valid
    /// coordinate window are requested from the service.
    pub fn events(&self, id: impl Into<Identifier>, geo: bool) -> Result<Vec<Event>> {
        let numeric = self.numeric_id(&id.into())?;
        let mut url = self.registry(&format!("/items/{numeric}/events"));
        if geo {
            let window = urlencoding::encode(
                "latitude>=-90 and latitude<=90 and longitude>=-180 and longitude<=180",
            );
            url = append_query(&url, &[("where", window.as_ref())]);
        }

        let body = self.fetch_json(&url)?;
        parse_events(&records(body))
    }

    /// Contacts attached to an item, with persons and roles resolved.
    pub fn contacts(&self, id: impl Into<Identifier>) -> Result<Vec<Contact>> {
        let numeric = self.numeric_id(&id.into())?;
        let url = self.registry(&format!("/items/{numeric}/contacts"));
        let body = self.fetch_json(&url)?;
        parse_contacts(&records(body))
    }

    /// Direct children of an item, as flat listing records.
    pub fn subitems(&self, id: impl Into<Identifier>) -> Result<Vec<SubItem>> {
        let numeric = self.numeric_id(&id.into())?;
        let url = self.registry(&format!("/items?where=parent.id=={numeric}"));
        let body = self.fetch_json(&url)?;
        parse_subitems(&records(body))
    }

    /// Resources attached to an item. The listing only carries ids, so each
    /// entry triggers a detail fetch; entries without an external linkage
    /// fall back to the registry payload URL.
    pub fn resources(&self, id: impl Into<Identifier>) -> Result<Vec<Resource>> {
        let item = self.lookup_item(&id.into())?;
        let numeric = record_id(&item)?;

        let listing_url = self.registry(&format!("/items/{numeric}/resources"));
        let listing = records(self.fetch_json(&listing_url)?);

        let mut resources = Vec::with_capacity(listing.len());
        for entry in listing {
            let Some(resource_id) = entry.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let url = self.registry(&format!("/items/{numeric}/resources/{resource_id}"));
            let detail = self.fetch_json(&url)?;
            resources.push(Resource {
                name: detail
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: detail
                    .pointer("/type/generalName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: detail
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                link: detail
                    .get("linkage")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{url}/payload")),
            });
        }
        Ok(resources)
    }

    /// Most recent position of the platform owning `code`.
    ///
    /// The code is truncated to its first two segments (the registry's
    /// two-level platform convention), the platform's events are fetched,
    /// optionally filtered to `allowed_vocables`, and the coordinates of the
    /// most recent qualifying event are returned. Ongoing events count as
    /// most recent. Yields an all-`None` [`Geolocation`] when nothing
    /// qualifies.
    pub fn geolocation(
        &self,
        code: &str,
        allowed_vocables: Option<&[&str]>,
    ) -> Result<Geolocation> {
        let platform = Identifier::platform_code(code)?;
        let events = self.events(platform, false)?;
        Ok(most_recent_position(&events, allowed_vocables))
    }

    // ---- data web service ------------------------------------------------

    /// Searches the data service's sensor catalog. The optional pattern
    /// supports `*` wildcards and matches parameter urns.
    pub fn sensors(&self, pattern: Option<&str>) -> Result<Value> {
        let mut url = format!("{}/sensors", self.dws_url);
        if let Some(pattern) = pattern {
            let encoded = urlencoding::encode(pattern);
            url = append_query(&url, &[("pattern", encoded.as_ref())]);
        }
        self.fetch_json(&url)
    }

    /// Downloads aggregated time-series data for the query's sensors and
    /// parses the tab-separated stream into a [`DataTable`].
    pub fn data(&self, query: &DataQuery) -> Result<DataTable> {
        let url = format!("{}/data?{}", self.dws_url, query.to_query()?);

        let pb = if self.progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}").unwrap());
            pb.set_message("downloading data");
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let payload = self.fetch_raw(&url);
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        parse_table(&payload?)
    }

    // ---- helpers ---------------------------------------------------------

    fn registry(&self, path: &str) -> String {
        format!("{}{}", self.registry_url, path)
    }

    /// Resolves a code or id to the raw registry item record.
    fn lookup_item(&self, id: &Identifier) -> Result<Value> {
        match id {
            Identifier::Code(code) => {
                let url = self.registry(&format!(
                    "/items?where=code=LIKE={}",
                    urlencoding::encode(code)
                ));
                let mut matches = records(self.fetch_json(&url)?);
                if matches.is_empty() {
                    return Err(Error::EmptyResult { url });
                }
                Ok(matches.swap_remove(0))
            }
            Identifier::Id(id) => self.fetch_json(&self.registry(&format!("/items/{id}"))),
        }
    }

    fn numeric_id(&self, id: &Identifier) -> Result<i64> {
        match id {
            Identifier::Id(id) => Ok(*id),
            Identifier::Code(_) => record_id(&self.lookup_item(id)?),
        }
    }

    fn fetch_detailed(&self, id: impl Into<Identifier>) -> Result<(String, Value)> {
        let numeric = self.numeric_id(&id.into())?;
        // The registry inlines the full sensor-output/child tree only when
        // asked for it.
        let url = self.registry(&format!("/items/{numeric}?with=all"));
        let raw = self.fetch_json(&url)?;
        Ok((url, raw))
    }
}

fn record_id(record: &Value) -> Result<i64> {
    record
        .get("id")
        .or_else(|| record.get("itemID"))
        .and_then(Value::as_i64)
        .ok_or(Error::MissingField {
            field: "id",
            context: "item record",
        })
}

/// Unwraps the `records` envelope the registry puts around listings.
fn records(mut body: Value) -> Vec<Value> {
    match body.get_mut("records").map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => Vec::new(),
    }
}
