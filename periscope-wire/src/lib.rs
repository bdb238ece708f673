//! # Shared Wire Types (probe ↔ control plane)
//!
//! Defines the messages exchanged between a running probe and its control
//! plane, plus the desired-state trace record both sides agree on. The
//! transport is newline-delimited JSON: one message per line, each line a
//! single serialized [`ClientMessage`] or [`ServerMessage`].
//!
//! ## Desired-state model
//!
//! The control plane never sends incremental edits. Every [`DesiredSet`]
//! carries the *complete* set of traces that should be live, and the probe
//! reconciles its installed state against it. An empty set means "remove
//! everything".
//!
//! ## Key Types
//!
//! - [`TraceSpec`] - One desired trace: what to log, where
//! - [`ClientMessage`] / [`ServerMessage`] - The session protocol
//! - [`FileRecord`] - Script inventory entry uploaded at session start
//!
//! [`DesiredSet`]: ServerMessage::DesiredSet

use serde::{Deserialize, Serialize};

/// One desired trace statement.
///
/// `statement` is a template string; `{name}` placeholders are substituted
/// with the named parameter's value each time the traced function passes
/// `line`. `id` is the control plane's stable identity for this trace and
/// drives reconciliation diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpec {
    pub id: String,
    pub statement: String,
    /// 1-based source line the statement attaches to
    pub line: u32,
    pub function: FunctionTarget,
}

/// The function a trace attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionTarget {
    pub name: String,
    /// Present when the function is a method of a group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<ClassRef>,
    pub file: FileRef,
}

/// Reference to the group (class-like namespace) owning a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub name: String,
}

/// Reference to a script file by control-plane name.
///
/// Names are relative to the script root, `/`-separated, with extension
/// (for example `"worker/tasks.psc"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub name: String,
}

/// One entry of the script inventory the probe uploads after connecting.
///
/// `hash` is the hex SHA-256 of the file contents; the control plane uses
/// it to skip re-ingesting files it has already seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub hash: String,
    pub lines: u32,
    pub source: String,
    pub summary: FileSummary,
}

/// Structural summary of one script file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub functions: Vec<FunctionInfo>,
    pub groups: Vec<GroupInfo>,
}

/// Position of a top-level function or group method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Position and members of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub methods: Vec<FunctionInfo>,
}

/// Messages sent by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// First message of every session.
    Hello {
        probe_name: String,
        version: String,
        /// Root package relative trace paths resolve against
        package: String,
    },
    /// Periodic liveness signal.
    Heartbeat { seq: u64 },
    /// One log line produced by an installed trace.
    Log { text: String },
    /// A trace could not be installed, or failed at runtime.
    ///
    /// `trace_id` is absent when the failure could not be attributed to a
    /// single trace (for example a whole-function recompilation fault).
    TraceFailure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
        message: String,
    },
    /// Full script inventory, sent once per session after `Hello`.
    ModuleInventory { files: Vec<FileRecord> },
}

/// Messages sent by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The complete set of traces that should currently be live.
    ///
    /// Sent once on subscribe and again on every change. The probe treats
    /// each occurrence as a wholesale replacement.
    DesiredSet { traces: Vec<TraceSpec> },
    /// Liveness check; the probe answers with a `Heartbeat`.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> TraceSpec {
        TraceSpec {
            id: "trace-1".to_string(),
            statement: "x is {x}".to_string(),
            line: 3,
            function: FunctionTarget {
                name: "update".to_string(),
                parent_class: Some(ClassRef { name: "Counter".to_string() }),
                file: FileRef { name: "counter.psc".to_string() },
            },
        }
    }

    #[test]
    fn test_trace_spec_wire_shape() {
        let json = serde_json::to_value(sample_spec()).expect("serialize");
        assert_eq!(json["id"], "trace-1");
        assert_eq!(json["line"], 3);
        assert_eq!(json["function"]["name"], "update");
        assert_eq!(json["function"]["parentClass"]["name"], "Counter");
        assert_eq!(json["function"]["file"]["name"], "counter.psc");
    }

    #[test]
    fn test_parent_class_omitted_for_free_functions() {
        let mut spec = sample_spec();
        spec.function.parent_class = None;
        let json = serde_json::to_value(&spec).expect("serialize");
        assert!(json["function"].get("parentClass").is_none());

        // And deserializes back without the field present
        let parsed: TraceSpec = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_client_message_tagging() {
        let msg = ClientMessage::TraceFailure {
            trace_id: Some("trace-9".to_string()),
            message: "no such module".to_string(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "traceFailure");
        assert_eq!(json["traceId"], "trace-9");

        let hb = ClientMessage::Heartbeat { seq: 7 };
        let json = serde_json::to_string(&hb).expect("serialize");
        let back: ClientMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, hb);
    }

    #[test]
    fn test_desired_set_round_trip() {
        let msg = ServerMessage::DesiredSet { traces: vec![sample_spec()] };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"desiredSet\""));
        let back: ServerMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_file_record_hash_field() {
        let record = FileRecord {
            name: "main.psc".to_string(),
            hash: "ab".repeat(32),
            lines: 10,
            source: "fn main() {}\n".to_string(),
            summary: FileSummary::default(),
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["hash"].as_str().map(str::len), Some(64));
        assert_eq!(json["summary"]["functions"], serde_json::json!([]));
    }
}
