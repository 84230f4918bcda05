use serde::Deserialize;
use serde_json::Value;

use super::common::{BackendClient, BackendError};

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MeResponse {
    pub user_id: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct DbHealth {
    pub ok: bool,
    pub row_count: usize,
    pub topics: Value,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Objective {
    pub id: Value,
    pub code: String,
    pub statement: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectivesResponse {
    pub objectives: Vec<Objective>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct GeneratedProblem {
    pub problem_id: Value,
    pub objective_code: String,
    pub prompt: String,
    pub params: Value,
    pub expected_units: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct GradeResult {
    pub is_correct: bool,
    pub your_value: f64,
    pub your_units: String,
    pub correct_value: f64,
    pub feedback: String,
    pub attempt_id: Value,
}

/// Typed calls to the learning engine backend.
pub struct Api<'a> {
    client: &'a BackendClient,
}

impl<'a> Api<'a> {
    pub fn new(client: &'a BackendClient) -> Self {
        Self { client }
    }

    pub async fn health(&self) -> Result<Value, BackendError> {
        self.client.get("/").await
    }

    /// Backend check that also queries the database.
    pub async fn health_db(&self) -> Result<DbHealth, BackendError> {
        self.client.get_json("/health/db").await
    }

    pub async fn me(&self) -> Result<MeResponse, BackendError> {
        self.client.get_json("/me").await
    }

    pub async fn objectives(&self) -> Result<ObjectivesResponse, BackendError> {
        self.client.get_json("/objectives").await
    }

    pub async fn generate_problem(
        &self,
        objective_code: &str,
    ) -> Result<GeneratedProblem, BackendError> {
        let path = format!(
            "/problems/generate/{}",
            urlencoding::encode(objective_code)
        );
        self.client.post_json(&path, None).await
    }

    pub async fn grade_attempt(
        &self,
        problem_id: &str,
        value: f64,
        units: &str,
    ) -> Result<GradeResult, BackendError> {
        let path = format!(
            "/attempts/grade/{}?value={}&units={}",
            urlencoding::encode(problem_id),
            value,
            urlencoding::encode(units)
        );
        self.client.post_json(&path, None).await
    }
}
