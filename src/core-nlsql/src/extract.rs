//! Pulls the SQL out of a model's free-form answer.

/// Opens the block we look for.
pub const SQL_FENCE_OPEN: &str = "```sql";
/// Closes it.
pub const FENCE_CLOSE: &str = "```";

/// Outcome of scanning generated text for a ```sql block.
///
/// `Sql("")` and `NotFound` are different answers: the first means the model wrote an
/// empty block, the second that there was no block at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedQuery {
    Sql(String),
    NotFound,
}

impl ExtractedQuery {
    pub fn sql(&self) -> Option<&str> {
        match self {
            ExtractedQuery::Sql(sql) => Some(sql),
            ExtractedQuery::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ExtractedQuery::Sql(_))
    }
}

/// Returns the trimmed contents of the first ```sql block.
///
/// The closing fence is the first ``` after the opening marker. An opening marker with no
/// closing fence is `NotFound`: partial blocks are never returned.
pub fn extract(text: &str) -> ExtractedQuery {
    let Some(open) = text.find(SQL_FENCE_OPEN) else {
        return ExtractedQuery::NotFound;
    };
    let body_start = open + SQL_FENCE_OPEN.len();

    match text[body_start..].find(FENCE_CLOSE) {
        Some(len) => ExtractedQuery::Sql(text[body_start..body_start + len].trim().to_string()),
        None => ExtractedQuery::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(s: &str) -> ExtractedQuery {
        ExtractedQuery::Sql(s.to_string())
    }

    #[test]
    fn test_extract_discards_surrounding_prose() {
        assert_eq!(extract("prefix ```sql SELECT 1; ``` suffix"), sql("SELECT 1;"));
    }

    #[test]
    fn test_extract_without_fence() {
        assert_eq!(extract("no fences here"), ExtractedQuery::NotFound);
        assert_eq!(extract(""), ExtractedQuery::NotFound);
    }

    #[test]
    fn test_extract_empty_fence_is_not_not_found() {
        let result = extract("```sql``` ");
        assert_eq!(result, sql(""));
        assert!(result.is_found());
    }

    #[test]
    fn test_extract_unterminated_fence() {
        assert_eq!(extract("```sql\nSELECT * FROM orders"), ExtractedQuery::NotFound);
    }

    #[test]
    fn test_extract_does_not_reprocess_its_output() {
        let first = extract("```sql\nSELECT 1;\n```");
        let again = extract(first.sql().unwrap());
        assert_eq!(again, ExtractedQuery::NotFound);
    }

    #[test]
    fn test_extract_preserves_inner_whitespace() {
        let text = "Sure!\n```sql\n  SELECT id,\n         name\n  FROM customers\n\n  LIMIT 5;\n```\nDone.";
        assert_eq!(
            extract(text),
            sql("SELECT id,\n         name\n  FROM customers\n\n  LIMIT 5;")
        );
    }

    #[test]
    fn test_extract_takes_first_block() {
        let text = "```sql\nSELECT 1;\n```\nor maybe\n```sql\nSELECT 2;\n```";
        assert_eq!(extract(text), sql("SELECT 1;"));
    }

    #[test]
    fn test_extract_ignores_untagged_fence() {
        assert_eq!(extract("```\nSELECT 1;\n```"), ExtractedQuery::NotFound);
    }

    #[test]
    fn test_extract_closing_fence_must_follow_opening() {
        // The ``` that precedes the ```sql marker can't close it.
        let text = "```text\nnot sql\n``` then ```sql SELECT 3 ```";
        assert_eq!(extract(text), sql("SELECT 3"));
    }

    #[test]
    fn test_extract_scenario_from_chatty_model() {
        let text = "Here is the query:\n```sql\nSELECT customer_id FROM orders LIMIT 5;\n```";
        assert_eq!(extract(text), sql("SELECT customer_id FROM orders LIMIT 5;"));
    }
}
