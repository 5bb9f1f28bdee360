//! Expands answered questions into multi-turn conversations.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, records_to_items, TaskConfigView};
use crate::constants::config_keys;
use crate::domain::{ConversationTurn, QuestionRecord, TurnRole};
use crate::error::TaskerResult;
use crate::generation::{GenerationRequest, ModelConfig};
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

const DEFAULT_ROUNDS: usize = 3;

pub struct MultiTurnGenerationProcessor {
    deps: ProcessorDeps,
}

impl MultiTurnGenerationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }

    async fn generate(&self, prompt: String, model: &ModelConfig) -> Result<String, ItemError> {
        generate_text(
            self.deps.generation.as_ref(),
            GenerationRequest::text(prompt, model.clone()),
        )
        .await
    }
}

fn transcript(context: &str, turns: &[ConversationTurn]) -> String {
    let mut out = String::new();
    if !context.trim().is_empty() {
        out.push_str("Reference text:\n");
        out.push_str(context);
        out.push_str("\n\n");
    }
    for turn in turns {
        let speaker = match turn.role {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        };
        out.push_str(&format!("{speaker}: {}\n", turn.content));
    }
    out
}

#[async_trait]
impl WorkItemProcessor for MultiTurnGenerationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::MultiTurnGeneration
    }

    fn step_label(&self) -> &'static str {
        "Generating conversations"
    }

    fn empty_message(&self) -> &'static str {
        "No answered questions need a conversation"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let questions = self
            .deps
            .repository
            .questions_without_conversation(&task.project_id)
            .await?;
        records_to_items(&questions, |q| (q.id.as_str(), q.question.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let question: QuestionRecord = item.record()?;
        let (view, model) = item_context(task)?;
        let rounds = view.count(config_keys::ROUNDS, DEFAULT_ROUNDS);
        let language = view.language_label();

        let first_answer = match question.answer.clone().filter(|a| !a.trim().is_empty()) {
            Some(answer) => answer,
            None => {
                let prompt = format!(
                    "{}Answer the user's question in {language}.",
                    transcript(&question.context, &[ConversationTurn {
                        role: TurnRole::User,
                        content: question.question.clone(),
                    }])
                );
                self.generate(prompt, &model).await?
            }
        };

        let mut turns = vec![
            ConversationTurn {
                role: TurnRole::User,
                content: question.question.clone(),
            },
            ConversationTurn {
                role: TurnRole::Assistant,
                content: first_answer,
            },
        ];

        for _ in 1..rounds {
            let follow_up_prompt = format!(
                "{}Write the user's next follow-up question in {language}. Reply with the question only.",
                transcript(&question.context, &turns)
            );
            let follow_up = self.generate(follow_up_prompt, &model).await?;
            turns.push(ConversationTurn {
                role: TurnRole::User,
                content: follow_up,
            });

            let reply_prompt = format!(
                "{}Reply to the user's last message as the assistant, in {language}.",
                transcript(&question.context, &turns)
            );
            let reply = self.generate(reply_prompt, &model).await?;
            turns.push(ConversationTurn {
                role: TurnRole::Assistant,
                content: reply,
            });
        }

        let turn_count = turns.len();
        self.deps
            .repository
            .save_conversation(&task.project_id, &question.id, turns)
            .await?;

        Ok(ItemOutput::new()
            .with("questionId", json!(question.id))
            .with("rounds", json!(rounds))
            .with("turnCount", json!(turn_count)))
    }
}
