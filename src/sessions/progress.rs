//! Scenario progress merging.
//!
//! Progress lives in a JSON column on the session row. Updates are merged
//! into what is stored; the start time is written once and kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioProgress {
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub responses: Map<String, Value>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub scenario_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scenario_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /api/chat-sessions/{id}/scenario-progress`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "ProgressUpdateBody")]
pub struct ProgressUpdate {
    pub scenario_id: Option<String>,
    pub current_step: Option<u32>,
    pub completed_steps: Option<Vec<String>>,
    pub responses: Option<Map<String, Value>>,
    pub completed: Option<bool>,
}

/// Accepts snake_case and camelCase keys, alone or together.
#[derive(Deserialize)]
struct ProgressUpdateBody {
    #[serde(default)]
    scenario_id: Option<String>,
    #[serde(default, rename = "scenarioId")]
    scenario_id_camel: Option<String>,
    #[serde(default)]
    current_step: Option<u32>,
    #[serde(default, rename = "currentStep")]
    current_step_camel: Option<u32>,
    #[serde(default)]
    completed_steps: Option<Vec<String>>,
    #[serde(default, rename = "completedSteps")]
    completed_steps_camel: Option<Vec<String>>,
    #[serde(default)]
    responses: Option<Map<String, Value>>,
    #[serde(default)]
    completed: Option<bool>,
}

impl From<ProgressUpdateBody> for ProgressUpdate {
    fn from(body: ProgressUpdateBody) -> Self {
        Self {
            scenario_id: body.scenario_id.or(body.scenario_id_camel),
            current_step: body.current_step.or(body.current_step_camel),
            completed_steps: body.completed_steps.or(body.completed_steps_camel),
            responses: body.responses,
            completed: body.completed,
        }
    }
}

/// Merge `update` into `existing` at time `now`.
pub fn apply_update(existing: Option<ScenarioProgress>, update: &ProgressUpdate, now: DateTime<Utc>) -> ScenarioProgress {
    let mut progress = existing.unwrap_or_default();

    if let Some(scenario_id) = &update.scenario_id {
        progress.scenario_id = Some(scenario_id.clone());
    }
    if let Some(step) = update.current_step {
        progress.current_step = step;
    }
    if let Some(steps) = &update.completed_steps {
        progress.completed_steps = steps.clone();
    }
    if let Some(responses) = &update.responses {
        for (key, value) in responses {
            progress.responses.insert(key.clone(), value.clone());
        }
    }
    match update.completed {
        Some(true) => {
            progress.completed = true;
            if progress.scenario_completed_at.is_none() {
                progress.scenario_completed_at = Some(now);
            }
        }
        Some(false) => {
            progress.completed = false;
            progress.scenario_completed_at = None;
        }
        None => {}
    }

    if progress.scenario_started_at.is_none() {
        progress.scenario_started_at = Some(now);
    }
    progress.updated_at = Some(now);
    progress
}
