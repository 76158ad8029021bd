use reqwest::{header::CONTENT_TYPE, Client, Method, Request, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, time::Duration};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

#[derive(Clone, Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        ApiClient::from_parts(self.base_url, self.timeout)
    }
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder(base_url).build()
    }

    fn from_parts(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        if base_url.trim().is_empty() {
            return Err(ApiError::Config("api base url must not be empty"));
        }
        let mut parsed = Url::parse(base_url.trim()).map_err(|err| ApiError::Url(err.to_string()))?;
        if !parsed.path().ends_with('/') {
            let new_path = format!("{}/", parsed.path().trim_end_matches('/'));
            parsed.set_path(&new_path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.build_request(Method::GET, path, None::<&()>)?;
        self.execute(req).await
    }

    pub async fn post<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.build_request(Method::POST, path, body)?;
        self.execute(req).await
    }

    pub async fn put<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.build_request(Method::PUT, path, body)?;
        self.execute(req).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.build_request(Method::DELETE, path, None::<&()>)?;
        self.execute(req).await
    }

    // "products", "/products" and "products/" all resolve to {base}/products/
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let clean = path.trim_start_matches('/').trim_end_matches('/');
        let relative = if clean.is_empty() {
            String::new()
        } else {
            format!("{clean}/")
        };
        self.base_url
            .join(&relative)
            .map_err(|err| ApiError::Url(err.to_string()))
    }

    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Request, ApiError> {
        let url = self.url_for(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(ApiError::Json)?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
        }
        builder.build().map_err(ApiError::Http)
    }

    async fn execute<T: DeserializeOwned>(&self, req: Request) -> Result<T, ApiError> {
        let method = req.method().clone();
        let url = req.url().to_string();
        tracing::debug!(%method, %url, "api request");
        let resp = self.http.execute(req).await.map_err(ApiError::Http)?;
        let status = resp.status();
        let body = resp.text().await.map_err(ApiError::Http)?;
        parse_response(status, &body)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Config(&'static str),
    Url(String),
    Http(reqwest::Error),
    Json(serde_json::Error),
    Api { status: StatusCode, body: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Url(err) => write!(f, "url error: {err}"),
            Self::Http(err) => write!(f, "http error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Api { status, body } => write!(f, "api error {}: {}", status.as_u16(), body),
        }
    }
}

impl std::error::Error for ApiError {}

pub fn parse_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(ApiError::Api {
            status,
            body: body.to_string(),
        });
    }
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(ApiError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn client() -> ApiClient {
        ApiClient::new("https://shop.example.test").unwrap()
    }

    #[test]
    fn paths_are_joined_with_trailing_slash() {
        let api = client();
        assert_eq!(
            api.url_for("products").unwrap().as_str(),
            "https://shop.example.test/products/"
        );
        assert_eq!(
            api.url_for("//products/42").unwrap().as_str(),
            "https://shop.example.test/products/42/"
        );
        assert_eq!(
            api.url_for("orders/").unwrap().as_str(),
            "https://shop.example.test/orders/"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let api = ApiClient::new("https://shop.example.test/api").unwrap();
        assert_eq!(
            api.url_for("/categories").unwrap().as_str(),
            "https://shop.example.test/api/categories/"
        );
    }

    #[test]
    fn post_request_carries_json_body() {
        let req = client()
            .build_request(Method::POST, "cart/items", Some(&json!({ "product_id": "p-1", "quantity": 2 })))
            .unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(
            req.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: Value = serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["quantity"], 2);
    }

    #[test]
    fn bodyless_request_has_no_content_type() {
        let req = client()
            .build_request(Method::DELETE, "cart/items/p-1", None::<&()>)
            .unwrap();
        assert!(req.headers().get(CONTENT_TYPE).is_none());
        assert!(req.body().is_none());
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(ApiClient::new("  "), Err(ApiError::Config(_))));
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::Url(_))));
    }

    #[test]
    fn non_success_status_becomes_api_error() {
        let err = parse_response::<Value>(StatusCode::NOT_FOUND, "missing").unwrap_err();
        assert!(format!("{err}").contains("404"));
    }

    #[test]
    fn empty_success_body_is_null() {
        let out: Value = parse_response(StatusCode::NO_CONTENT, "").unwrap();
        assert_eq!(out, Value::Null);
        let out: Value = parse_response(StatusCode::OK, r#"{"id":1}"#).unwrap();
        assert_eq!(out["id"], 1);
    }
}
