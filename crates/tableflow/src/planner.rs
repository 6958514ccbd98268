//! Instruction-to-plan translation via the LLM.

use std::sync::Arc;

use llm::{parse_model_json, AiProvider, ChatMessage, GenerateOptions, PromptManager};
use serde_json::json;
use tracing::{debug, instrument};

use crate::errors::TableResult;
use crate::ops::TableOp;
use crate::table::DataTable;

/// Rows shown to the model as a sample of the table.
const SAMPLE_ROWS: usize = 5;

/// Turns a natural-language instruction into a [`TableOp`] plan.
pub struct Planner {
    provider: Arc<dyn AiProvider>,
    prompts: PromptManager,
    model: String,
}

impl Planner {
    /// Create a planner over the given chat provider.
    pub fn new(provider: Arc<dyn AiProvider>, prompts: PromptManager, model: impl Into<String>) -> Self {
        Self {
            provider,
            prompts,
            model: model.into(),
        }
    }

    /// Ask the model for an operation plan for `instruction` against `table`.
    ///
    /// The prompt carries the column list and the first few rows as JSON;
    /// the response must be a bare JSON array of ops (fences tolerated).
    #[instrument(skip(self, table), fields(columns = table.columns.len(), rows = table.rows.len()))]
    pub async fn plan(&self, table: &DataTable, instruction: &str) -> TableResult<Vec<TableOp>> {
        let sample: Vec<serde_json::Value> = table
            .rows
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| {
                let object = table
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| {
                        let value = serde_json::to_value(cell)
                            .unwrap_or(serde_json::Value::Null);
                        (col.clone(), value)
                    })
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();

        let prompt = self.prompts.render(
            "table_plan",
            &json!({
                "columns": table.columns,
                "sample": serde_json::to_string(&sample).unwrap_or_default(),
                "instruction": instruction,
            }),
        )?;

        let options = GenerateOptions {
            temperature: Some(0.0),
            json_mode: true,
            ..GenerateOptions::default()
        };
        let response = self
            .provider
            .generate_text(&self.model, &[ChatMessage::user(prompt)], &options)
            .await?;

        let ops: Vec<TableOp> = parse_model_json(&response.text)?;
        debug!(ops = ops.len(), "Planned table operations");
        Ok(ops)
    }
}
