//! Prompt template management.

use handlebars::Handlebars;
use serde::Serialize;

use crate::errors::LlmResult;

/// Manages Handlebars prompt templates.
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    /// Create a new prompt manager with embedded templates.
    pub fn new() -> LlmResult<Self> {
        let mut handlebars = Handlebars::new();

        handlebars.register_template_string("answer", ANSWER_TEMPLATE)?;
        handlebars.register_template_string("table_plan", TABLE_PLAN_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// Render a template with the given data.
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> LlmResult<String> {
        Ok(self.handlebars.render(template, data)?)
    }
}

/// Retrieval QA prompt template.
///
/// `context` is the list of retrieved task chunks; `question` the user query.
const ANSWER_TEMPLATE: &str = r"You are an assistant answering questions about a user's project-management tasks.

Use ONLY the task context below. If the context does not contain the answer,
say you do not have that information. Be concise.

## Task context
{{#if context}}
{{#each context}}
- {{this}}
{{/each}}
{{else}}
(no task data available)
{{/if}}

## Question
{{question}}
";

/// Instruction-to-plan prompt template for tabular editing.
///
/// The model must respond with a JSON array of operations; the allowed
/// operation shapes are spelled out inline so no schema round-trip is needed.
const TABLE_PLAN_TEMPLATE: &str = r#"You are a data assistant. The user has a table with these columns:
{{#each columns}}
- {{this}}
{{/each}}

Sample rows (JSON):
{{sample}}

Given this instruction: "{{instruction}}", produce the operations that modify the table.

Respond with ONLY a JSON array. Each element is one of:
- {"op": "add_row", "values": {"<column>": <value>, ...}}
- {"op": "add_column", "name": "<column>", "default": <value>}
- {"op": "drop_column", "name": "<column>"}
- {"op": "rename_column", "from": "<column>", "to": "<column>"}
- {"op": "set_cell", "row": <index>, "column": "<column>", "value": <value>}
- {"op": "update_where", "column": "<column>", "equals": <value>, "set_column": "<column>", "set_value": <value>}
- {"op": "delete_rows", "column": "<column>", "equals": <value>}
- {"op": "filter_rows", "column": "<column>", "equals": <value>}
- {"op": "sort_by", "column": "<column>", "descending": <bool>}

Rules:
- Output only the JSON array, no prose and no code fences.
- Use only columns that exist in the table (except add_column/rename targets).
- Values are JSON strings, numbers, booleans, or null.
"#;
