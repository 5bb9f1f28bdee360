//! Helpers shared by the built-in processors: a typed view of the task configuration,
//! generation calls and tolerant parsing of model output.

use serde::Serialize;
use serde_json::Value;

use crate::constants::config_keys;
use crate::domain::Evaluation;
use crate::error::{TaskerError, TaskerResult};
use crate::generation::{GenerationClient, GenerationRequest, ModelConfig};
use crate::models::Task;
use crate::orchestration::{ItemError, WorkItem};

/// Typed access to the parts of a task's configuration blob processors care about
#[derive(Debug, Clone)]
pub struct TaskConfigView {
    model: Option<ModelConfig>,
    language: String,
    params: Value,
}

impl TaskConfigView {
    pub fn from_task(task: &Task) -> TaskerResult<Self> {
        let model = match task.config_value(config_keys::MODEL) {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(serde_json::from_str::<ModelConfig>(raw).map_err(|e| {
                TaskerError::ValidationError(format!("Invalid model configuration: {e}"))
            })?),
            Some(value) => Some(serde_json::from_value::<ModelConfig>(value.clone()).map_err(|e| {
                TaskerError::ValidationError(format!("Invalid model configuration: {e}"))
            })?),
        };

        let language = task
            .config_value(config_keys::LANGUAGE)
            .and_then(Value::as_str)
            .unwrap_or("en")
            .to_string();

        Ok(Self {
            model,
            language,
            params: task.config.clone(),
        })
    }

    /// The model to generate with; processors that call the generation service fail
    /// the task when it is missing
    pub fn require_model(&self, task: &Task) -> TaskerResult<&ModelConfig> {
        self.model
            .as_ref()
            .filter(|model| !model.name.is_empty())
            .ok_or_else(|| {
                TaskerError::processor(&task.task_type, "Task configuration has no model")
            })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Language name used in prompts
    pub fn language_label(&self) -> &'static str {
        if self.language.to_lowercase().starts_with("zh") {
            "Chinese"
        } else {
            "English"
        }
    }

    /// A positive integer parameter, or `default` when absent or invalid
    pub fn count(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(default)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Configuration view and model for processing one item.
///
/// `enumerate` already rejected a missing model, so a failure here means the task
/// configuration is unusable for this item.
pub fn item_context(task: &Task) -> Result<(TaskConfigView, ModelConfig), ItemError> {
    let view = TaskConfigView::from_task(task).map_err(|e| ItemError::InvalidItem(e.to_string()))?;
    let model = view
        .require_model(task)
        .map_err(|e| ItemError::InvalidItem(e.to_string()))?
        .clone();
    Ok((view, model))
}

/// Turn domain records into work items keyed by `id` and labelled by `label`
pub fn records_to_items<T, F>(records: &[T], key: F) -> TaskerResult<Vec<WorkItem>>
where
    T: Serialize,
    F: Fn(&T) -> (&str, &str),
{
    records
        .iter()
        .map(|record| {
            let (id, label) = key(record);
            WorkItem::from_record(id, label, record).map_err(TaskerError::from)
        })
        .collect()
}

/// One generation call with item-level error mapping
pub async fn generate_text(
    client: &dyn GenerationClient,
    request: GenerationRequest,
) -> Result<String, ItemError> {
    let response = client.generate(&request).await?;
    let text = response.text.trim().to_string();
    if text.is_empty() {
        return Err(ItemError::Parse("generation returned no text".to_string()));
    }
    Ok(text)
}

/// Find the JSON document inside model output.
///
/// Accepts bare JSON, a fenced code block, or JSON surrounded by prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    [('[', ']'), ('{', '}')].iter().find_map(|(open, close)| {
        let start = trimmed.find(*open)?;
        let end = trimmed.rfind(*close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    })
}

/// Parse a list of questions from model output.
///
/// JSON arrays of strings or of `{"question": ...}` objects are accepted; otherwise
/// each non-empty line is taken as one question with list markers stripped.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, ItemError> {
    let from_json = match extract_json(text) {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) => Some(s),
                Value::Object(map) => map
                    .get("question")
                    .or_else(|| map.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let items: Vec<String> = if from_json.is_empty() {
        text.lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty() && !line.starts_with("```"))
            .map(str::to_string)
            .collect()
    } else {
        from_json
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    if items.is_empty() {
        return Err(ItemError::Parse("no questions found in generation output".to_string()));
    }
    Ok(items)
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let stripped = if without_digits.len() < line.len() {
        without_digits.trim_start_matches(['.', ')', ':'])
    } else {
        line.trim_start_matches(['-', '*', '•'])
    };
    stripped.trim()
}

/// Parse an evaluation object `{"score": 0-5, "evaluation": "..."}` from model output
pub fn parse_evaluation(text: &str) -> Result<Evaluation, ItemError> {
    let Some(Value::Object(map)) = extract_json(text) else {
        return Err(ItemError::Parse("evaluation output is not a JSON object".to_string()));
    };

    let score = match map.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ItemError::Parse("evaluation has no numeric score".to_string()))?;

    let comment = ["evaluation", "comment", "reason"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    Ok(Evaluation {
        score: score.clamp(0.0, 5.0),
        comment,
    })
}
