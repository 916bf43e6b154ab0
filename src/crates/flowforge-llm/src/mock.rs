//! A deterministic [`PlanningModel`] test double, in the spirit of the
//! teacher's own `MockModel` fixtures: no network, fully inspectable.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::error::Result;
use crate::traits::{PlanRequest, PlanningModel};

/// Replays a fixed sequence of responses, one per call, repeating the last
/// entry once the sequence is exhausted. Records every request it was
/// given so tests can assert on retry feedback.
pub struct MockPlanningModel {
    responses: Vec<Value>,
    calls: Mutex<Vec<PlanRequest>>,
}

impl MockPlanningModel {
    /// Return the same response to every call.
    pub fn always(response: Value) -> Self {
        Self::sequence(vec![response])
    }

    /// Return each response in order, repeating the last once exhausted.
    pub fn sequence(responses: Vec<Value>) -> Self {
        Self { responses, calls: Mutex::new(Vec::new()) }
    }

    /// Number of times `generate_plan` has been called.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The `validation_feedback` carried by the most recent request.
    pub fn last_feedback(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|r| r.validation_feedback.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlanningModel for MockPlanningModel {
    async fn generate_plan(&self, request: PlanRequest) -> Result<Value> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len().min(self.responses.len().saturating_sub(1));
        calls.push(request);
        Ok(self.responses[index].clone())
    }
}
