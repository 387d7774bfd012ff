use anyhow::{bail, Context, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::analytics::report::{RunReportResponse, DIMENSIONS, METRICS};
use crate::analytics::AnalyticsSource;
use crate::config::AnalyticsConfig;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are replaced this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// A Google service-account key, or a ready bearer token.
#[derive(Deserialize)]
#[serde(untagged)]
enum Credentials {
    ServiceAccount(ServiceAccount),
    Token { access_token: String },
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

enum Auth {
    Static(String),
    ServiceAccount {
        client_email: String,
        token_uri: String,
        key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl Auth {
    fn from_blob(raw: &str) -> Result<Self> {
        let credentials: Credentials = serde_json::from_str(raw)
            .context("Credential blob is not a service account or token")?;
        match credentials {
            Credentials::Token { access_token } => Ok(Auth::Static(access_token)),
            Credentials::ServiceAccount(account) => {
                let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
                    .context("Service account private key is not an RSA PEM")?;
                Ok(Auth::ServiceAccount {
                    client_email: account.client_email,
                    token_uri: account.token_uri,
                    key,
                    cached: Mutex::new(None),
                })
            }
        }
    }
}

/// Signed JWT-bearer assertion for the token endpoint.
fn sign_assertion(
    client_email: &str,
    token_uri: &str,
    key: &EncodingKey,
    now: i64,
) -> Result<String> {
    let claims = AssertionClaims {
        iss: client_email,
        scope: ANALYTICS_SCOPE,
        aud: token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
        .context("Failed to sign analytics token assertion")
}

/// Reqwest-backed client for the Analytics Data API `runReport` call.
pub struct Ga4Client {
    client: Client,
    api_base: String,
    property_id: Option<String>,
    auth: Option<Auth>,
}

impl Ga4Client {
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build analytics HTTP client")?;

        // A broken blob is not fatal at startup; report calls fail instead.
        let auth = config
            .credentials
            .as_deref()
            .and_then(|raw| match Auth::from_blob(raw) {
                Ok(auth) => Some(auth),
                Err(e) => {
                    log::error!("Error parsing analytics credentials: {:#}", e);
                    None
                }
            });

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            property_id: config.property_id.clone(),
            auth,
        })
    }

    fn request_body() -> serde_json::Value {
        json!({
            "dateRanges": [{"startDate": "7daysAgo", "endDate": "today"}],
            "dimensions": DIMENSIONS.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
            "metrics": METRICS.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
        })
    }

    /// Bearer token for the next call, exchanging a fresh assertion when the cached one is stale.
    async fn bearer_token(&self, auth: &Auth) -> Result<String> {
        let (client_email, token_uri, key, cached) = match auth {
            Auth::Static(token) => return Ok(token.clone()),
            Auth::ServiceAccount {
                client_email,
                token_uri,
                key,
                cached,
            } => (client_email, token_uri, key, cached),
        };

        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let assertion = sign_assertion(client_email, token_uri, key, now)?;
        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Analytics token request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token endpoint returned {}: {}", status, body);
        }
        let token = response
            .json::<TokenResponse>()
            .await
            .context("Failed to decode analytics token")?;
        log::debug!("Obtained analytics token for {}", client_email);

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }
}

#[async_trait::async_trait]
impl AnalyticsSource for Ga4Client {
    async fn run_report(&self) -> Result<RunReportResponse> {
        let Some(property_id) = self.property_id.as_deref() else {
            bail!("analytics property id is not configured");
        };
        let Some(auth) = self.auth.as_ref() else {
            bail!("analytics credentials are not configured");
        };
        let token = self.bearer_token(auth).await?;

        let url = format!(
            "{}/v1beta/properties/{}:runReport",
            self.api_base, property_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&Self::request_body())
            .send()
            .await
            .context("Analytics request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Analytics API returned {}: {}", status, body);
        }

        response
            .json::<RunReportResponse>()
            .await
            .context("Failed to decode analytics report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Form, Path, State},
        http::{header::AUTHORIZATION, HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use jsonwebtoken::{DecodingKey, Validation};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/analytics_test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/analytics_test_key.pub.pem");
    const CLIENT_EMAIL: &str = "reporter@projukti.iam.gserviceaccount.com";

    #[derive(Debug, Deserialize)]
    struct ReceivedClaims {
        iss: String,
        scope: String,
        aud: String,
        iat: i64,
        exp: i64,
    }

    fn verify(assertion: &str) -> Option<ReceivedClaims> {
        let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).ok()?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        jsonwebtoken::decode::<ReceivedClaims>(assertion, &key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    #[derive(Default)]
    struct Upstream {
        token_requests: AtomicUsize,
    }

    async fn issue_token(
        State(upstream): State<Arc<Upstream>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        upstream.token_requests.fetch_add(1, Ordering::SeqCst);
        if form.get("grant_type").map(String::as_str) != Some(JWT_BEARER_GRANT) {
            return Err(StatusCode::BAD_REQUEST);
        }
        let claims = form
            .get("assertion")
            .and_then(|assertion| verify(assertion))
            .ok_or(StatusCode::UNAUTHORIZED)?;
        if claims.iss != CLIENT_EMAIL
            || claims.scope != ANALYTICS_SCOPE
            || !claims.aud.ends_with("/token")
        {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({
            "access_token": "stub-token",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
    }

    async fn report_rows(
        Path(property): Path<String>,
        headers: HeaderMap,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if bearer != Some("Bearer stub-token") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        if property != "123:runReport" {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(json!({
            "rows": [{
                "dimensionValues": [
                    {"value": "Bangladesh"}, {"value": "mobile"}, {"value": "Dhaka"}, {"value": "/"}
                ],
                "metricValues": [{"value": "5"}, {"value": "2"}, {"value": "40.0"}, {"value": "3"}]
            }]
        })))
    }

    async fn spawn_upstream() -> (String, Arc<Upstream>) {
        let upstream = Arc::new(Upstream::default());
        let app = Router::new()
            .route("/token", post(issue_token))
            .route("/v1beta/properties/:property", post(report_rows))
            .with_state(upstream.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, upstream)
    }

    fn service_account(token_uri: Option<&str>) -> String {
        let mut blob = json!({
            "type": "service_account",
            "client_email": CLIENT_EMAIL,
            "private_key": TEST_KEY,
        });
        if let Some(uri) = token_uri {
            blob["token_uri"] = json!(uri);
        }
        blob.to_string()
    }

    #[test]
    fn test_assertion_claims() {
        let key = EncodingKey::from_rsa_pem(TEST_KEY.as_bytes()).unwrap();
        let assertion =
            sign_assertion(CLIENT_EMAIL, GOOGLE_TOKEN_URI, &key, 1_700_000_000).unwrap();
        let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.set_audience(&[GOOGLE_TOKEN_URI]);
        let claims = jsonwebtoken::decode::<ReceivedClaims>(&assertion, &key, &validation)
            .unwrap()
            .claims;
        assert_eq!(claims.iss, CLIENT_EMAIL);
        assert_eq!(claims.scope, ANALYTICS_SCOPE);
        assert_eq!(claims.aud, GOOGLE_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_credential_blob_kinds() {
        assert!(matches!(
            Auth::from_blob(&service_account(None)),
            Ok(Auth::ServiceAccount { ref token_uri, .. }) if token_uri == GOOGLE_TOKEN_URI
        ));
        assert!(matches!(
            Auth::from_blob(r#"{"access_token": "ya29.token"}"#),
            Ok(Auth::Static(ref token)) if token == "ya29.token"
        ));
        let broken_key = json!({"client_email": CLIENT_EMAIL, "private_key": "not a key"});
        assert!(Auth::from_blob(&broken_key.to_string()).is_err());
    }

    #[tokio::test]
    async fn test_service_account_token_exchange() {
        let (base, upstream) = spawn_upstream().await;
        let client = Ga4Client::from_config(&AnalyticsConfig {
            property_id: Some("123".to_string()),
            credentials: Some(service_account(Some(&format!("{}/token", base)))),
            api_base: base.clone(),
            ..AnalyticsConfig::default()
        })
        .unwrap();

        let report = client.run_report().await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].dimension_values[2].value, "Dhaka");

        // The exchanged token is reused until it nears expiry.
        client.run_report().await.unwrap();
        assert_eq!(upstream.token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_request_fails_report() {
        let (base, _upstream) = spawn_upstream().await;
        let client = Ga4Client::from_config(&AnalyticsConfig {
            property_id: Some("123".to_string()),
            credentials: Some(service_account(Some(&format!("{}/missing", base)))),
            api_base: base,
            ..AnalyticsConfig::default()
        })
        .unwrap();
        let err = client.run_report().await.unwrap_err();
        assert!(err.to_string().contains("Token endpoint returned 404"));
    }

    #[test]
    fn test_request_body_lists_dimensions_in_order() {
        let body = Ga4Client::request_body();
        assert_eq!(body["dimensions"][0]["name"], "country");
        assert_eq!(body["dimensions"][3]["name"], "pagePath");
        assert_eq!(body["metrics"][2]["name"], "averageSessionDuration");
        assert_eq!(body["dateRanges"][0]["startDate"], "7daysAgo");
    }

    #[tokio::test]
    async fn test_missing_configuration_fails() {
        let client = Ga4Client::from_config(&AnalyticsConfig {
            credentials: Some("not json".to_string()),
            property_id: Some("123".to_string()),
            ..AnalyticsConfig::default()
        })
        .unwrap();
        assert!(client.auth.is_none());
        assert!(client.run_report().await.is_err());

        let client = Ga4Client::from_config(&AnalyticsConfig::default()).unwrap();
        assert!(client.run_report().await.is_err());
    }
}
