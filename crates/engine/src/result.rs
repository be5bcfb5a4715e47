//! Job-result assembly (spec §6 "Job-result output").

use graph_model::{EngineContext, NodeKind, NodeValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Succeeded,
    Failed,
}

/// The final, structured outcome of one job: `jobId`, `statusCode`, and a
/// map of object key to produced object (`DATA`/`FILE`/`STORAGE`/`MODEL`/
/// `RESULT`, represented here simply as the `NodeValue` `BuildJobResult`
/// assembled for that key).
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub status_code: StatusCode,
    pub objects: HashMap<String, NodeValue>,
    /// Populated only on failure: one entry per failed node's recorded
    /// error summary (spec §7's "multiple independent failures are
    /// aggregated into a single composite error").
    pub errors: Vec<String>,
}

impl JobResult {
    pub fn failed(job_id: String, errors: Vec<String>) -> Self {
        Self { job_id, status_code: StatusCode::Failed, objects: HashMap::new(), errors }
    }

    /// Build the result from a settled `EngineContext`: every job has
    /// exactly one `BuildJobResult` node (spec §4.1 step 7), located by kind
    /// rather than by the graph's own root id since a `SaveJobResult` node
    /// may sit between it and the root when the job requested persistence.
    /// If it succeeded, its `objects` entry is the result map; otherwise
    /// collect every failed node's error summary.
    pub fn from_context(job_id: String, ctx: &EngineContext) -> Self {
        let build_result = ctx
            .nodes
            .values()
            .find(|node| matches!(node.node.kind, NodeKind::BuildJobResult { .. }));
        if let Some(node) = build_result {
            if let Some(NodeValue::Map(result)) = &node.result {
                if let Some(NodeValue::Map(objects)) = result.get("objects") {
                    return Self {
                        job_id,
                        status_code: StatusCode::Succeeded,
                        objects: objects.clone(),
                        errors: Vec::new(),
                    };
                }
            }
        }
        let mut errors: Vec<String> = ctx
            .failed
            .iter()
            .filter_map(|id| ctx.nodes.get(id))
            .filter_map(|n| n.error.as_ref())
            .map(|e| e.summary.clone())
            .collect();
        errors.sort();
        errors.dedup();
        Self::failed(job_id, errors)
    }

    /// Render as the plain JSON object the spec's `statusCode`/`jobId`
    /// naming implies, suitable for `SaveJobResult`-style serialisation.
    pub fn to_json(&self) -> serde_json::Value {
        let objects: serde_json::Map<String, serde_json::Value> =
            self.objects.iter().map(|(k, v)| (k.clone(), node_value_to_json(v))).collect();
        serde_json::json!({
            "jobId": self.job_id,
            "statusCode": match self.status_code {
                StatusCode::Succeeded => "SUCCEEDED",
                StatusCode::Failed => "FAILED",
            },
            "objects": objects,
            "errors": self.errors,
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_json())
    }
}

fn node_value_to_json(value: &NodeValue) -> serde_json::Value {
    match value {
        NodeValue::Scalar(v) => v.clone(),
        NodeValue::List(items) => serde_json::Value::Array(items.iter().map(node_value_to_json).collect()),
        NodeValue::Map(entries) | NodeValue::Bundle(entries) => {
            serde_json::Value::Object(entries.iter().map(|(k, v)| (k.clone(), node_value_to_json(v))).collect())
        }
        NodeValue::Unit => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_has_no_objects() {
        let result = JobResult::failed("job-1".into(), vec!["boom".into()]);
        assert_eq!(result.status_code, StatusCode::Failed);
        assert!(result.objects.is_empty());
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn to_json_reports_status_code() {
        let result = JobResult::failed("job-1".into(), vec![]);
        let json = result.to_json();
        assert_eq!(json["statusCode"], "FAILED");
        assert_eq!(json["jobId"], "job-1");
    }
}
