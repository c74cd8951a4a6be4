//! JSON shapes of the Jenkins remote API and their mapping to domain types.

use serde::Deserialize;
use std::collections::HashSet;

use super::{JobNode, JobNodeKind, ParamDef, ParamKind};
use crate::remote::{BuildStatus, Executable, QueueItem};

#[derive(Debug, Deserialize)]
pub(super) struct CrumbResp {
    #[serde(rename = "crumbRequestField", default)]
    pub field: String,
    #[serde(rename = "crumb", default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct QueueResp {
    #[serde(default)]
    executable: Option<ExecutableResp>,
    #[serde(default)]
    cancelled: bool,
}

#[derive(Debug, Deserialize)]
struct ExecutableResp {
    #[serde(default)]
    number: u64,
    #[serde(default)]
    url: String,
}

impl From<QueueResp> for QueueItem {
    fn from(q: QueueResp) -> Self {
        QueueItem {
            cancelled: q.cancelled,
            executable: q.executable.map(|e| Executable {
                url: e.url,
                number: e.number,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct BuildResp {
    #[serde(default)]
    building: bool,
    #[serde(default)]
    result: Option<String>,
}

impl From<BuildResp> for BuildStatus {
    fn from(b: BuildResp) -> Self {
        BuildStatus {
            building: b.building,
            result: b.result,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct JobListResp {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "_class", default)]
    class: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct JobParamsResp {
    #[serde(default)]
    actions: Vec<ParamHolder>,
    #[serde(default)]
    property: Vec<ParamHolder>,
}

#[derive(Debug, Default, Deserialize)]
struct ParamHolder {
    #[serde(rename = "parameterDefinitions", default)]
    parameter_definitions: Vec<ParamDefResp>,
}

#[derive(Debug, Deserialize)]
struct ParamDefResp {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(rename = "defaultParameterValue", default)]
    default_value: Option<DefaultValueResp>,
}

#[derive(Debug, Deserialize)]
struct DefaultValueResp {
    #[serde(default)]
    value: serde_json::Value,
}

fn is_folder_class(class: &str) -> bool {
    class.contains("Folder") || class.contains("organization") || class.contains("WorkflowMultiBranch")
}

/// One folder level: dedup by URL, folders first, then case-insensitive name.
pub(super) fn job_nodes(resp: JobListResp, prefix: &str) -> Vec<JobNode> {
    let mut seen = HashSet::new();
    let mut out: Vec<JobNode> = resp
        .jobs
        .into_iter()
        .filter(|j| seen.insert(j.url.clone()))
        .map(|j| {
            let full_name = if prefix.trim_matches('/').is_empty() {
                j.name.clone()
            } else {
                format!("{}/{}", prefix.trim_matches('/'), j.name)
            };
            let kind = if is_folder_class(&j.class) {
                JobNodeKind::Folder
            } else {
                JobNodeKind::Job
            };
            JobNode {
                name: j.name,
                full_name,
                url: j.url,
                kind,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        (a.kind != JobNodeKind::Folder)
            .cmp(&(b.kind != JobNodeKind::Folder))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    out
}

fn param_kind(type_name: &str) -> Option<ParamKind> {
    if type_name.contains("ChoiceParameterDefinition") {
        Some(ParamKind::Choice)
    } else if type_name.contains("StringParameterDefinition") {
        Some(ParamKind::String)
    } else if type_name.contains("TextParameterDefinition") {
        Some(ParamKind::Text)
    } else if type_name.contains("BooleanParameterDefinition") {
        Some(ParamKind::Boolean)
    } else if type_name.contains("PasswordParameterDefinition") {
        Some(ParamKind::Password)
    } else {
        None
    }
}

fn default_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Parameter definitions from `actions` then `property`; unknown kinds are
/// skipped and the first definition of a name wins.
pub(super) fn param_defs(resp: JobParamsResp) -> Vec<ParamDef> {
    let mut seen = HashSet::new();
    resp.actions
        .into_iter()
        .chain(resp.property)
        .flat_map(|holder| holder.parameter_definitions)
        .filter_map(|p| {
            let kind = param_kind(&p.kind)?;
            Some(ParamDef {
                name: p.name,
                kind,
                description: p.description.unwrap_or_default(),
                choices: p.choices,
                default: p
                    .default_value
                    .map(|d| default_string(d.value))
                    .unwrap_or_default(),
            })
        })
        .filter(|d| seen.insert(d.name.clone()))
        .collect()
}
