//! HTTP client for the `/Test/{name}` request surface

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::fixture::Fixture;
use crate::target::FrameworkTarget;

/// Payload returned by every test endpoint, on either stack.
///
/// Serialized in PascalCase; the camelCase spelling some serializers emit
/// is accepted on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestModel {
    #[serde(alias = "name")]
    pub name: String,

    #[serde(alias = "age")]
    pub age: i32,

    #[serde(alias = "description", default)]
    pub description: Option<String>,
}

impl TestModel {
    /// Model with the default age of 1 and no description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age: 1,
            description: None,
        }
    }
}

/// Issues test requests against ready fixture targets.
#[derive(Debug, Clone)]
pub struct CompatClient {
    client: reqwest::Client,
}

impl CompatClient {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub fn test_url(target: &FrameworkTarget, name: &str) -> String {
        format!("{}/Test/{}", target.base_url(), name)
    }

    /// `GET /Test/{name}` on the target registered under `key`.
    pub async fn get(
        &self,
        fixture: &Fixture,
        key: &str,
        name: &str,
        headers: &[(String, String)],
    ) -> HarnessResult<TestModel> {
        let target = fixture.require_ready(key)?;
        let url = Self::test_url(target, name);

        let mut request = self.client.get(&url);
        for (header, value) in headers {
            request = request.header(header.as_str(), value.as_str());
        }

        self.read_model(&url, request).await
    }

    /// `POST /Test/{name}` with `body` serialized as JSON.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        fixture: &Fixture,
        key: &str,
        name: &str,
        body: &B,
    ) -> HarnessResult<TestModel> {
        let target = fixture.require_ready(key)?;
        let url = Self::test_url(target, name);
        let request = self.client.post(&url).json(body);

        self.read_model(&url, request).await
    }

    async fn read_model(&self, url: &str, request: reqwest::RequestBuilder) -> HarnessResult<TestModel> {
        let response = request.send().await?;
        let status = response.status();
        let content = response.text().await?;
        debug!("Response from {}:\n{}", url, content);

        if !status.is_success() {
            return Err(HarnessError::UnexpectedStatus {
                url: url.to_string(),
                status,
                body: content,
            });
        }

        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_wire_format() {
        let json = serde_json::to_string(&TestModel::new("Get Ping")).unwrap();
        assert_eq!(json, r#"{"Name":"Get Ping","Age":1,"Description":null}"#);
    }

    #[test]
    fn test_model_accepts_camel_case() {
        let model: TestModel =
            serde_json::from_str(r#"{"name":"Post Pong","age":1,"description":"x"}"#).unwrap();
        assert_eq!(model.name, "Post Pong");
        assert_eq!(model.description.as_deref(), Some("x"));

        let model: TestModel = serde_json::from_str(r#"{"Name":"Get Ping","Age":1}"#).unwrap();
        assert_eq!(model, TestModel::new("Get Ping"));
    }
}
