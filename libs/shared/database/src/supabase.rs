use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// Raw outcome of an edge function call. Transport failures are reported
/// through `Err`; any HTTP status lands here.
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    pub status: u16,
    pub body: Value,
}

impl FunctionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        // PostgREST answers 204 with an empty body for writes without representation
        let bytes = response.bytes().await?;
        let data = if bytes.is_empty() {
            serde_json::from_value(Value::Null)?
        } else {
            serde_json::from_slice::<T>(&bytes)?
        };
        Ok(data)
    }

    /// Writes that must echo the stored row back.
    pub async fn request_returning<T>(&self, method: Method, path: &str,
                                      auth_token: Option<&str>, body: Option<Value>)
                                      -> Result<T>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        self.request_with_headers(method, path, auth_token, body, Some(headers)).await
    }

    pub async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<Value> {
        self.request::<Value>(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": password,
                "data": metadata,
            })),
        ).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Value> {
        self.request::<Value>(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({
                "email": email,
                "password": password,
            })),
        ).await
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<()> {
        let _: Value = self.request(
            Method::POST,
            "/auth/v1/logout",
            Some(auth_token),
            None,
        ).await?;
        Ok(())
    }

    pub async fn get_user(&self, auth_token: &str) -> Result<Value> {
        self.request::<Value>(
            Method::GET,
            "/auth/v1/user",
            Some(auth_token),
            None,
        ).await
    }

    /// Calls an edge function. Only transport failures become `Err`.
    pub async fn invoke_function(&self, name: &str, body: Value,
                                 auth_token: Option<&str>) -> Result<FunctionResponse> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        debug!("Invoking edge function {}", name);

        let response = self.client.post(&url)
            .headers(self.get_headers(auth_token)?)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(FunctionResponse { status, body })
    }
}
