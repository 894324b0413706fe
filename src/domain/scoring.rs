// ============================================================
// Layer 3 — Scoring Request / Response Types
// ============================================================
// Wire shapes shared by the HTTP server, the peer client and
// the orchestrator:
//
//   request   {model_name, text, hubs: [..] | null}
//   response  {result: [{hub, score}] | null, error: string | null}
//   listing   {models: [{name}]}

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub model_name: String,
    pub text:       String,
    #[serde(default)]
    pub hubs:       Option<Vec<String>>,
}

impl ScoreRequest {
    pub fn new(model_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { model_name: model_name.into(), text: text.into(), hubs: None }
    }

    pub fn with_hubs<I, S>(mut self, hubs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hubs = Some(hubs.into_iter().map(Into::into).collect());
        self
    }

    /// The hubs to score: the requested ones, or `defaults` when the
    /// request carries none (absent or empty list).
    pub fn candidate_hubs<'a>(&'a self, defaults: &'a [String]) -> &'a [String] {
        match &self.hubs {
            Some(hubs) if !hubs.is_empty() => hubs,
            _ => defaults,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubScore {
    pub hub:   String,
    pub score: f32,
}

impl HubScore {
    pub fn new(hub: impl Into<String>, score: f32) -> Self {
        Self { hub: hub.into(), score }
    }
}

/// Sort by score descending. The sort is stable, so hubs with equal
/// scores keep their candidate order. NaN scores sort last.
pub fn rank(mut scores: Vec<HubScore>) -> Vec<HubScore> {
    scores.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    scores
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub result: Option<Vec<HubScore>>,
    pub error:  Option<String>,
}

impl ScoreResponse {
    pub fn ok(result: Vec<HubScore>) -> Self {
        Self { result: Some(result), error: None }
    }

    pub fn failed(err: &ServiceError) -> Self {
        Self { result: None, error: Some(err.public_message()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelItem {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelItem>,
}
