use std::collections::HashMap;

use indoc::indoc;
use subst::substitute;

use crate::catalog::TableName;

/// Stands in for the table list when the catalog had nothing to offer.
pub const NO_TABLES_MARKER: &str = "No tables available.";

const TEXT_TO_SQL: &str = indoc! { "
  You are an expert data analyst. Convert the following natural language request into a SQL query.
  Available tables:
  ${TABLES}
  Request: ${REQUEST}
  SQL Query:
"};

/// A fully rendered prompt. Built once per request and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `- name` line per table, or the fallback marker when there are none.
pub fn format_table_list(tables: &[TableName]) -> String {
    if tables.is_empty() {
        return NO_TABLES_MARKER.to_string();
    }
    tables
        .iter()
        .map(|table| format!("- {}", table))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the text-to-SQL instructions around the user's question. Pure: same inputs, same prompt.
pub fn prompt_text_to_sql(question: &str, tables: &[TableName]) -> Result<Prompt, subst::Error> {
    let res = substitute(TEXT_TO_SQL, &{
        let mut v = HashMap::new();
        v.insert("TABLES".to_string(), format_table_list(tables));
        v.insert("REQUEST".to_string(), question.to_string());
        v
    })?;
    Ok(Prompt(res))
}
