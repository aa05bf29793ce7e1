use crate::cookies::{self, CookieBundle};
use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// Public bearer token of the platform's web client; pairs with the replayed
/// account cookies, it grants nothing by itself.
const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const VERIFY_CREDENTIALS_URL: &str = "https://api.x.com/1.1/account/verify_credentials.json";

/// An authenticated handle on the platform's private API surface.
/// Construction succeeds only with a usable cookie bundle; the bundle is
/// read-only for the lifetime of the session.
pub struct Session {
    client: reqwest::Client,
    bundle: CookieBundle,
}

impl Session {
    pub fn new(bundle: CookieBundle) -> Result<Self> {
        cookies::ensure_essential(&bundle)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
            )
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self { client, bundle })
    }

    pub fn from_cookie_file(path: &Path) -> Result<Self> {
        let bundle = cookies::load_bundle(path)?;
        Self::new(bundle)
    }

    fn cookie_header(&self) -> String {
        self.bundle
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Headers the platform expects on every call: replayed cookies, the web
    /// bearer token, and a CSRF token mirroring the ct0 cookie.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_str(&self.cookie_header()).context("cookie header")?,
        );
        if let Some(ct0) = self.bundle.get("ct0") {
            headers.insert(
                "x-csrf-token",
                HeaderValue::from_str(ct0).context("csrf header")?,
            );
        }
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {BEARER_TOKEN}")).context("bearer header")?,
        );
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("origin", HeaderValue::from_static("https://x.com"));
        headers.insert("referer", HeaderValue::from_static("https://x.com/"));
        headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));
        headers.insert(
            "x-twitter-auth-type",
            HeaderValue::from_static("OAuth2Session"),
        );
        Ok(headers)
    }

    /// GET a GraphQL endpoint with urlencoded `variables`/`features` params
    /// and decode the response body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        variables: &serde_json::Value,
        features: &serde_json::Value,
    ) -> Result<T> {
        let url = build_query_url(endpoint, variables, features);
        tracing::debug!(%endpoint, "GET");
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .with_context(|| format!("request to {endpoint} failed"))?;
        decode_response(response).await
    }

    /// POST a JSON body (GraphQL mutations).
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        tracing::debug!(%endpoint, "POST");
        let response = self
            .client
            .post(endpoint)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {endpoint} failed"))?;
        decode_response(response).await
    }

    /// Confirm the replayed cookies are accepted and return the
    /// authenticated account's handle.
    pub async fn verify(&self) -> Result<String> {
        let account: serde_json::Value = {
            let response = self
                .client
                .get(VERIFY_CREDENTIALS_URL)
                .headers(self.headers()?)
                .send()
                .await
                .context("credential check failed")?;
            decode_response(response).await?
        };

        if let Some(errors) = account.get("errors").and_then(|e| e.as_array()) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error");
                return Err(anyhow!("authentication rejected: {message}"));
            }
        }

        account
            .get("screen_name")
            .and_then(|s| s.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("credential check returned no screen_name"))
    }
}

fn build_query_url(
    endpoint: &str,
    variables: &serde_json::Value,
    features: &serde_json::Value,
) -> String {
    format!(
        "{}?variables={}&features={}",
        endpoint,
        urlencoding::encode(&variables.to_string()),
        urlencoding::encode(&features.to_string()),
    )
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.context("failed to read body")?;
    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        return Err(anyhow!("platform API error {status}: {snippet}"));
    }
    serde_json::from_str(&body).with_context(|| {
        let snippet: String = body.chars().take(200).collect();
        format!("unexpected response shape: {snippet}")
    })
}
