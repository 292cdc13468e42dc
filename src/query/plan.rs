//! Prepared plans and PREPARE statements

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{ClientError, ClientResult};

use super::request::substitute_bucket;

const PREPARE_PREFIX: &str = "PREPARE ";

/// A server-compiled plan for one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPlan {
    pub original_statement: String,
    pub name: String,
    /// Opaque plan blob the server can execute without a name lookup
    pub encoded_plan: Option<String>,
}

impl PreparedPlan {
    pub fn new(
        original_statement: impl Into<String>,
        name: impl Into<String>,
        encoded_plan: Option<String>,
    ) -> Self {
        Self {
            original_statement: original_statement.into(),
            name: name.into(),
            encoded_plan,
        }
    }

    /// Build a plan from the last row of a PREPARE response
    pub fn from_prepare_row(original_statement: &str, row: &Value) -> ClientResult<Self> {
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::decode("PREPARE response row without a name"))?;
        let encoded_plan = row
            .get("encoded_plan")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self::new(original_statement, name, encoded_plan))
    }
}

/// Strip a leading `PREPARE ` so a statement is never prepared twice
pub fn strip_prepare_prefix(statement: &str) -> &str {
    let trimmed = statement.trim_start();
    match trimmed.get(..PREPARE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREPARE_PREFIX) => {
            trimmed[PREPARE_PREFIX.len()..].trim_start()
        }
        _ => trimmed,
    }
}

/// Deterministic plan name: hex SHA-256 of the statement text
pub fn plan_name(statement: &str) -> String {
    let digest = Sha256::digest(statement.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// `PREPARE \`name\` FROM statement`
pub fn prepare_statement(statement: &str) -> (String, String) {
    let body = strip_prepare_prefix(statement);
    let name = plan_name(body);
    let text = format!("{}`{}` FROM {}", PREPARE_PREFIX, name, body);
    (name, text)
}

/// Like [`prepare_statement`] with `#CURRENT_BUCKET#` resolved in the text.
///
/// The name hashes the unsubstituted statement, so it follows from the
/// plan cache key alone.
pub fn prepare_bucket_statement(statement: &str, bucket: &str) -> (String, String) {
    let body = strip_prepare_prefix(statement);
    let name = plan_name(body);
    let text = format!(
        "{}`{}` FROM {}",
        PREPARE_PREFIX,
        name,
        substitute_bucket(body, bucket)
    );
    (name, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_statement_shape() {
        let (name, text) = prepare_statement("SELECT * FROM default");
        assert_eq!(name.len(), 64);
        assert_eq!(text, format!("PREPARE `{}` FROM SELECT * FROM default", name));
    }

    #[test]
    fn test_prepare_prefix_not_doubled() {
        let (_, text) = prepare_statement("PREPARE SELECT *");
        assert!(!text.contains("FROM PREPARE"));
        assert!(!text["PREPARE ".len()..].contains("PREPARE"));
    }

    #[test]
    fn test_bucket_statement_named_before_substitution() {
        let statement = "SELECT * FROM #CURRENT_BUCKET#";
        let (travel, travel_text) = prepare_bucket_statement(statement, "travel");
        let (beer, _) = prepare_bucket_statement(statement, "beer");

        assert_eq!(travel, plan_name(statement));
        assert_eq!(travel, beer);
        assert_eq!(
            travel_text,
            format!("PREPARE `{}` FROM SELECT * FROM `travel`", travel)
        );
    }

    #[test]
    fn test_plan_name_deterministic() {
        assert_eq!(plan_name("SELECT 1"), plan_name("SELECT 1"));
        assert_ne!(plan_name("SELECT 1"), plan_name("SELECT 2"));
    }

    #[test]
    fn test_from_prepare_row() {
        let plan =
            PreparedPlan::from_prepare_row("SELECT 1", &json!({"name": "p1", "encoded_plan": "abc"}))
                .unwrap();
        assert_eq!(plan, PreparedPlan::new("SELECT 1", "p1", Some("abc".into())));

        let no_plan = PreparedPlan::from_prepare_row("SELECT 1", &json!({"name": "p1"})).unwrap();
        assert_eq!(no_plan.encoded_plan, None);
    }

    #[test]
    fn test_from_prepare_row_requires_name() {
        let err = PreparedPlan::from_prepare_row("SELECT 1", &json!({"encoded_plan": "abc"}));
        assert!(matches!(err, Err(ClientError::Decode { .. })));
    }
}
