pub mod csrf;
pub mod error;
pub(crate) mod response;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, Url};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::model::{ListResponse, Row, WriteResponse};

pub use csrf::CsrfSource;
pub use error::CrudError;

/// JSON object sent as the body of create/update requests.
pub type Payload = Map<String, Value>;

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub csrf: CsrfSource,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/json_app/".to_string(),
            timeout_seconds: 10,
            proxy: None,
            csrf: CsrfSource::default(),
        }
    }
}

/// REST client for the per-table CRUD endpoints under one base URL.
#[derive(Debug)]
pub struct CrudClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base: Url,
    csrf: CsrfSource,
    token: OnceCell<Option<String>>,
}

impl CrudClient {
    pub fn new(options: ClientOptions) -> Result<Self, CrudError> {
        let base = parse_base_url(&options.base_url)?;
        let jar = Arc::new(Jar::default());
        let http = build_http_client(
            jar.clone(),
            options.proxy.as_deref(),
            options.timeout_seconds,
        )?;
        Ok(Self {
            http,
            jar,
            base,
            csrf: options.csrf,
            token: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn table_url(&self, table: &str) -> Result<Url, CrudError> {
        let table = table.trim().trim_matches('/');
        if table.is_empty() {
            return Err(CrudError::InvalidUrl {
                url: self.base.to_string(),
                message: "table name is empty".to_string(),
            });
        }
        self.base
            .join(&format!("{table}/"))
            .map_err(|e| CrudError::InvalidUrl {
                url: format!("{}{table}/", self.base),
                message: e.to_string(),
            })
    }

    /// `GET <base>/<table>/?page=<n>&page_size=<n>`
    pub async fn list(
        &self,
        table: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ListResponse, CrudError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        let body = self.send(Method::GET, url.clone(), None).await?;
        response::decode_body(url.as_str(), &body)
    }

    /// `POST <base>/<table>/` with a body that never carries an `id`.
    pub async fn create(&self, table: &str, mut payload: Payload) -> Result<Row, CrudError> {
        payload.remove("id");
        let url = self.table_url(table)?;
        let body = self
            .send(Method::POST, url.clone(), Some(Value::Object(payload)))
            .await?;
        let resp: WriteResponse = response::decode_body(url.as_str(), &body)?;
        Ok(resp.into_row())
    }

    /// `PUT <base>/<table>/` with `id` injected into the body.
    pub async fn update(&self, table: &str, id: i64, mut payload: Payload) -> Result<Row, CrudError> {
        payload.insert("id".to_string(), Value::from(id));
        let url = self.table_url(table)?;
        let body = self
            .send(Method::PUT, url.clone(), Some(Value::Object(payload)))
            .await?;
        let resp: WriteResponse = response::decode_body(url.as_str(), &body)?;
        Ok(resp.into_row())
    }

    /// `DELETE <base>/<table>/` with body `{id}`.
    pub async fn delete(&self, table: &str, id: i64) -> Result<(), CrudError> {
        let url = self.table_url(table)?;
        let mut body = Map::new();
        body.insert("id".to_string(), Value::from(id));
        self.send(Method::DELETE, url, Some(Value::Object(body)))
            .await?;
        Ok(())
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<String, CrudError> {
        let mutating = method != Method::GET;
        let token = if mutating {
            self.csrf_token().await?
        } else {
            self.token.get().cloned().flatten()
        };

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(csrf::CSRF_HEADER, token);
        }
        if let Some(body) = body {
            req = req.body(body.to_string());
        }

        debug!(%method, %url, "sending request");
        let resp = req.send().await.map_err(|e| {
            warn!(%method, %url, error = %e, "request failed");
            CrudError::Network {
                url: url.to_string(),
                source: e,
            }
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| CrudError::Network {
            url: url.to_string(),
            source: e,
        })?;
        if !status.is_success() {
            let err = response::error_from_body(status.as_u16(), &text);
            warn!(%method, %url, status = status.as_u16(), "server rejected request: {}", err.user_message());
            return Err(err);
        }
        debug!(%method, %url, status = status.as_u16(), bytes = text.len(), "response received");
        Ok(text)
    }

    /// Resolves the CSRF token once and reuses it for later requests.
    pub async fn csrf_token(&self) -> Result<Option<String>, CrudError> {
        self.token
            .get_or_try_init(|| self.resolve_csrf())
            .await
            .cloned()
    }

    async fn resolve_csrf(&self) -> Result<Option<String>, CrudError> {
        match &self.csrf {
            CsrfSource::Disabled => Ok(None),
            CsrfSource::Token(token) => Ok(Some(token.clone())),
            CsrfSource::Cookie { name, header, page } => {
                if let Some(header) = header.as_deref() {
                    return csrf::cookie_value(header, name)
                        .map(Some)
                        .ok_or_else(|| CrudError::Csrf {
                            message: format!("cookie '{name}' missing from supplied cookie header"),
                        });
                }
                if let Some(token) = self.jar_cookie(name) {
                    return Ok(Some(token));
                }
                let page_url = self.page_url(page)?;
                self.fetch_page(page_url.clone()).await?;
                self.jar_cookie(name)
                    .map(Some)
                    .ok_or_else(|| CrudError::Csrf {
                        message: format!("cookie '{name}' not set by {page_url}"),
                    })
            }
            CsrfSource::FormField { page } => {
                let page_url = self.page_url(page)?;
                let html = self.fetch_page(page_url.clone()).await?;
                csrf::form_field_token(&html)
                    .map(Some)
                    .ok_or_else(|| CrudError::Csrf {
                        message: format!(
                            "no '{}' field in {page_url}",
                            csrf::CSRF_FORM_FIELD
                        ),
                    })
            }
        }
    }

    fn jar_cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let header = header.to_str().ok()?;
        csrf::cookie_value(header, name)
    }

    fn page_url(&self, page: &str) -> Result<Url, CrudError> {
        if page.trim().is_empty() {
            return Ok(self.base.clone());
        }
        self.base.join(page.trim()).map_err(|e| CrudError::InvalidUrl {
            url: page.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_page(&self, url: Url) -> Result<String, CrudError> {
        debug!(%url, "fetching page for CSRF token");
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CrudError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| CrudError::Network {
            url: url.to_string(),
            source: e,
        })?;
        if !(200..300).contains(&status) {
            return Err(response::error_from_body(status, &text));
        }
        Ok(text)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, CrudError> {
    let mut trimmed = raw.trim().to_string();
    if !trimmed.ends_with('/') {
        trimmed.push('/');
    }
    let url = Url::parse(&trimmed).map_err(|e| CrudError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CrudError::InvalidUrl {
            url: raw.to_string(),
            message: "expected an http or https URL".to_string(),
        });
    }
    Ok(url)
}

fn build_http_client(
    jar: Arc<Jar>,
    proxy: Option<&str>,
    timeout_seconds: usize,
) -> Result<reqwest::Client, CrudError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!("tablecrud/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .cookie_provider(jar)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(timeout);

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| CrudError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CrudError::HttpClientBuild { source: e })
}
