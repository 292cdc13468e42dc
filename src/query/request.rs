//! Query requests and their wire bodies

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::plan::PreparedPlan;

/// Placeholder replaced with the quoted bucket name before sending
pub const CURRENT_BUCKET_PLACEHOLDER: &str = "#CURRENT_BUCKET#";

/// Statement parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryParams {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

/// Index consistency the server waits for before scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanConsistency {
    NotBounded,
    RequestPlus,
    StatementPlus,
}

impl ScanConsistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanConsistency::NotBounded => "not_bounded",
            ScanConsistency::RequestPlus => "request_plus",
            ScanConsistency::StatementPlus => "statement_plus",
        }
    }
}

/// A query as the caller describes it
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    statement: String,
    params: QueryParams,
    client_context_id: String,
    timeout: Option<Duration>,
    adhoc: bool,
    read_only: bool,
    scan_consistency: Option<ScanConsistency>,
    raw: Map<String, Value>,
}

impl QueryRequest {
    /// Ad-hoc query with a generated client context id
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: QueryParams::None,
            client_context_id: Uuid::new_v4().to_string(),
            timeout: None,
            adhoc: true,
            read_only: false,
            scan_consistency: None,
            raw: Map::new(),
        }
    }

    /// Replace parameters with positional arguments
    pub fn positional(mut self, args: Vec<Value>) -> Self {
        self.params = QueryParams::Positional(args);
        self
    }

    /// Add one named parameter; a `$` prefix is added when missing
    pub fn named(mut self, name: &str, value: impl Into<Value>) -> Self {
        let key = if name.starts_with('$') {
            name.to_string()
        } else {
            format!("${}", name)
        };
        match &mut self.params {
            QueryParams::Named(map) => {
                map.insert(key, value.into());
            }
            other => {
                let mut map = Map::new();
                map.insert(key, value.into());
                *other = QueryParams::Named(map);
            }
        }
        self
    }

    pub fn client_context_id(mut self, id: impl Into<String>) -> Self {
        self.client_context_id = id.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `false` routes the statement through the prepared plan cache
    pub fn adhoc(mut self, adhoc: bool) -> Self {
        self.adhoc = adhoc;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn scan_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.scan_consistency = Some(consistency);
        self
    }

    /// Extra body field passed through untouched
    pub fn raw(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw.insert(key.into(), value.into());
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn context_id(&self) -> &str {
        &self.client_context_id
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_adhoc(&self) -> bool {
        self.adhoc
    }

    /// Key under which a prepared plan for this statement is cached
    pub fn cache_key(&self) -> &str {
        self.statement.trim()
    }

    /// Body for an ad-hoc execution
    pub fn adhoc_body(&self, bucket: &str) -> Value {
        let mut body = Map::new();
        body.insert(
            "statement".into(),
            Value::String(substitute_bucket(&self.statement, bucket)),
        );
        self.apply_options(&mut body);
        Value::Object(body)
    }

    /// Body executing a prepared plan
    pub fn execute_body(&self, plan: &PreparedPlan, include_encoded_plan: bool) -> Value {
        let mut body = Map::new();
        body.insert("prepared".into(), Value::String(plan.name.clone()));
        if include_encoded_plan {
            if let Some(encoded) = &plan.encoded_plan {
                body.insert("encoded_plan".into(), Value::String(encoded.clone()));
            }
        }
        self.apply_options(&mut body);
        Value::Object(body)
    }

    fn apply_options(&self, body: &mut Map<String, Value>) {
        match &self.params {
            QueryParams::None => {}
            QueryParams::Positional(args) if args.is_empty() => {}
            QueryParams::Positional(args) => {
                body.insert("args".into(), Value::Array(args.clone()));
            }
            QueryParams::Named(map) => {
                for (k, v) in map {
                    body.insert(k.clone(), v.clone());
                }
            }
        }
        if let Some(consistency) = self.scan_consistency {
            body.insert(
                "scan_consistency".into(),
                Value::String(consistency.as_str().to_string()),
            );
        }
        if let Some(timeout) = self.timeout {
            body.insert("timeout".into(), Value::String(format_duration(timeout)));
        }
        if self.read_only {
            body.insert("readonly".into(), Value::Bool(true));
        }
        body.insert(
            "client_context_id".into(),
            Value::String(self.client_context_id.clone()),
        );
        for (k, v) in &self.raw {
            body.insert(k.clone(), v.clone());
        }
    }
}

/// Replace the bucket placeholder with the backquoted bucket name
pub fn substitute_bucket(statement: &str, bucket: &str) -> String {
    statement.replace(CURRENT_BUCKET_PLACEHOLDER, &format!("`{}`", bucket))
}

/// Server-side duration string, in whole milliseconds
pub fn format_duration(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}
