use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Workflow identifier. Unique within a scheduler's lifetime.
pub type WorkflowId = String;

/// Closed set of workflow labels.
///
/// Only the execution-locality tags affect scheduling; the remaining labels
/// describe the kind of work and are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowTag {
    RequiresExternalSystem,
    EligibleForLocalExecution,
    MustExecuteLocally,
    CodeGeneration,
    WebScrape,
    DataProcessing,
    FileOperation,
}

impl WorkflowTag {
    pub const ALL: [WorkflowTag; 7] = [
        WorkflowTag::RequiresExternalSystem,
        WorkflowTag::EligibleForLocalExecution,
        WorkflowTag::MustExecuteLocally,
        WorkflowTag::CodeGeneration,
        WorkflowTag::WebScrape,
        WorkflowTag::DataProcessing,
        WorkflowTag::FileOperation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowTag::RequiresExternalSystem => "requires-external-system",
            WorkflowTag::EligibleForLocalExecution => "eligible-for-local-execution",
            WorkflowTag::MustExecuteLocally => "must-execute-locally",
            WorkflowTag::CodeGeneration => "code-generation",
            WorkflowTag::WebScrape => "web-scrape",
            WorkflowTag::DataProcessing => "data-processing",
            WorkflowTag::FileOperation => "file-operation",
        }
    }

    /// Whether this tag on its own admits a workflow to peer scheduling.
    pub fn permits_peer_execution(&self) -> bool {
        match self {
            WorkflowTag::EligibleForLocalExecution | WorkflowTag::MustExecuteLocally => true,
            WorkflowTag::RequiresExternalSystem
            | WorkflowTag::CodeGeneration
            | WorkflowTag::WebScrape
            | WorkflowTag::DataProcessing
            | WorkflowTag::FileOperation => false,
        }
    }
}

impl std::fmt::Display for WorkflowTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTag(s.to_string()))
    }
}

/// A proposed unit of work. Read-only once submitted to a scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<WorkflowTag>,
    /// Lower value = more urgent.
    pub priority: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowDefinition {
    /// Create a workflow with a random id, stamped with the current time.
    pub fn new(name: impl Into<String>, priority: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            tags: BTreeSet::new(),
            priority,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<WorkflowId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tag(mut self, tag: WorkflowTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = WorkflowTag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether any tag admits this workflow to decentralized scheduling.
    pub fn is_peer_eligible(&self) -> bool {
        self.tags.iter().any(WorkflowTag::permits_peer_execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_string_round_trip() {
        for tag in WorkflowTag::ALL {
            assert_eq!(tag.as_str().parse::<WorkflowTag>().unwrap(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "run-anywhere".parse::<WorkflowTag>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownTag(ref s) if s == "run-anywhere"));
    }

    #[test]
    fn tags_serialize_kebab_case() {
        let json = serde_json::to_string(&WorkflowTag::MustExecuteLocally).unwrap();
        assert_eq!(json, "\"must-execute-locally\"");
    }

    #[test]
    fn eligibility_requires_locality_tag() {
        let wf = WorkflowDefinition::new("scrape", 1.0).with_tag(WorkflowTag::WebScrape);
        assert!(!wf.is_peer_eligible());

        let wf = wf.with_tag(WorkflowTag::EligibleForLocalExecution);
        assert!(wf.is_peer_eligible());

        let wf = WorkflowDefinition::new("build", 1.0).with_tag(WorkflowTag::MustExecuteLocally);
        assert!(wf.is_peer_eligible());
    }

    #[test]
    fn external_tag_alone_is_not_eligible() {
        let wf = WorkflowDefinition::new("sync", 1.0).with_tag(WorkflowTag::RequiresExternalSystem);
        assert!(!wf.is_peer_eligible());
    }

    #[test]
    fn deserialize_with_defaults() {
        let json = r#"{
            "id": "wf-1",
            "name": "report",
            "priority": 2.5,
            "created_at": "2025-01-01T00:00:00Z"
        }"#;
        let wf: WorkflowDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(wf.id, "wf-1");
        assert!(wf.tags.is_empty());
        assert!(wf.metadata.is_empty());
    }

    #[test]
    fn deserialize_rejects_unknown_tag() {
        let json = r#"{
            "id": "wf-1",
            "name": "report",
            "tags": ["teleport"],
            "priority": 2.5,
            "created_at": "2025-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<WorkflowDefinition>(json).is_err());
    }
}
