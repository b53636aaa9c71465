//! Request checks run against every target and the suite report

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::client::{CompatClient, TestModel};
use crate::error::HarnessResult;
use crate::fixture::{Fixture, TargetStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// One request and the payload every stack must answer it with.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub method: Method,
    pub name: String,
    pub expected: TestModel,
    /// POST body; `null` when absent
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl TestCase {
    pub fn get(name: &str, expected: TestModel) -> Self {
        Self {
            method: Method::Get,
            name: name.to_string(),
            expected,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(name: &str, expected: TestModel) -> Self {
        Self {
            method: Method::Post,
            name: name.to_string(),
            expected,
            body: None,
            headers: Vec::new(),
        }
    }
}

/// The requests every target is checked with.
pub fn catalogue() -> Vec<TestCase> {
    vec![
        TestCase::get("Ping", TestModel::new("Get Ping")),
        TestCase::post("Pong", TestModel::new("Post Pong")),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub target: String,
    pub method: Method,
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub targets: Vec<TargetStatus>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.targets.iter().all(|t| t.ready)
    }

    /// Write `test-results.json` into `output_dir`.
    pub fn write_to(&self, output_dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Run every case against every target, in target order.
///
/// A target that never became ready fails each of its cases immediately.
pub async fn run_cases(fixture: &Fixture, client: &CompatClient, cases: &[TestCase]) -> SuiteReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut results = Vec::new();

    for target in fixture.targets() {
        for case in cases {
            let case_start = Instant::now();
            let outcome = match case.method {
                Method::Get => client.get(fixture, &target.key, &case.name, &case.headers).await,
                Method::Post => {
                    let body = case.body.clone().unwrap_or(serde_json::Value::Null);
                    client.post(fixture, &target.key, &case.name, &body).await
                }
            };

            let error = match outcome {
                Ok(actual) if actual == case.expected => None,
                Ok(actual) => Some(format!(
                    "expected {:?}, got {:?}",
                    case.expected, actual
                )),
                Err(e) => Some(e.to_string()),
            };

            let result = CaseResult {
                target: target.key.clone(),
                method: case.method,
                name: case.name.clone(),
                success: error.is_none(),
                duration_ms: case_start.elapsed().as_millis() as u64,
                error,
            };

            match &result.error {
                None => info!("✓ [{}] {} {} ({} ms)", result.target, result.method, result.name, result.duration_ms),
                Some(e) => error!("✗ [{}] {} {} - {}", result.target, result.method, result.name, e),
            }
            results.push(result);
        }
    }

    let passed = results.iter().filter(|r| r.success).count();
    let failed = results.len() - passed;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

    SuiteReport {
        run_id: Uuid::new_v4(),
        started_at,
        targets: fixture.status().to_vec(),
        total: results.len(),
        passed,
        failed,
        duration_ms,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_payloads() {
        let cases = catalogue();
        assert_eq!(cases.len(), 2);

        assert_eq!(cases[0].method, Method::Get);
        assert_eq!(cases[0].name, "Ping");
        assert_eq!(
            serde_json::to_value(&cases[0].expected).unwrap(),
            serde_json::json!({"Name": "Get Ping", "Age": 1, "Description": null})
        );

        assert_eq!(cases[1].method, Method::Post);
        assert_eq!(cases[1].name, "Pong");
        assert_eq!(cases[1].expected, TestModel::new("Post Pong"));
    }
}
