//! Reference generated type provider over a serde workflow schema
//!
//! # Examples
//!
//! ```
//! use wfscript_core::workspace::{VariableSchema, WorkflowSchema};
//!
//! let schema = WorkflowSchema {
//!     definition_id: "order-approval".to_string(),
//!     variables: vec![VariableSchema::new("Amount", "decimal")],
//!     ..Default::default()
//! };
//! let bundle = wfscript_core::workspace::render_schema(&schema);
//! assert!(bundle.text.contains("public decimal Amount { get; set; }"));
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{GeneratedTypeBundle, GeneratedTypeProvider};
use crate::error::ProviderError;
use crate::syntax::Keyword;

const VARIABLES_CLASS: &str = "Variables";
const ACTIVITIES_CLASS: &str = "Activities";
const COMPONENT_MODEL: &str = "System.ComponentModel";

/// What a workflow exposes to its scripts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSchema {
    pub definition_id: String,
    #[serde(default)]
    pub variables: Vec<VariableSchema>,
    #[serde(default)]
    pub activities: Vec<ActivitySchema>,
    /// Extra namespaces imported into every document
    #[serde(default)]
    pub imports: BTreeSet<String>,
    /// Extra assemblies referenced by the context
    #[serde(default)]
    pub assemblies: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl VariableSchema {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub outputs: Vec<OutputSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Generates a `Variables` class, one output class per activity and an
/// `Activities` class holding one field per activity
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaTypeProvider;

#[async_trait]
impl GeneratedTypeProvider for SchemaTypeProvider {
    type Schema = WorkflowSchema;

    async fn generate(&self, schema: &WorkflowSchema) -> Result<GeneratedTypeBundle, ProviderError> {
        if schema.definition_id.trim().is_empty() {
            return Err(ProviderError::InvalidSchema(
                "definition_id must not be empty".to_string(),
            ));
        }
        Ok(render_schema(schema))
    }
}

/// Render the generated-type source for `schema`
pub fn render_schema(schema: &WorkflowSchema) -> GeneratedTypeBundle {
    let mut assemblies = schema.assemblies.clone();
    let mut imports = schema.imports.clone();

    let documented = schema.variables.iter().any(|v| v.description.is_some())
        || schema.activities.iter().any(|a| a.description.is_some());

    let mut text = String::new();
    if documented {
        assemblies.insert(COMPONENT_MODEL.to_string());
        imports.insert(COMPONENT_MODEL.to_string());
    }

    // Variables
    let _ = writeln!(text, "public class {}\n{{", VARIABLES_CLASS);
    let mut taken = HashSet::new();
    for variable in &schema.variables {
        let Some(name) = unique_identifier(&variable.name, &mut taken) else {
            tracing::warn!(variable = %variable.name, "skipping variable without a usable name");
            continue;
        };
        write_description(&mut text, variable.description.as_deref());
        let _ = writeln!(
            text,
            "    public {} {} {{ get; set; }}",
            type_text(&variable.type_name),
            name
        );
    }
    text.push_str("}\n");

    // Activity outputs
    let mut activity_fields = Vec::new();
    let mut taken_activities = HashSet::new();
    for activity in &schema.activities {
        let Some(name) = unique_identifier(&activity.name, &mut taken_activities) else {
            tracing::warn!(activity = %activity.name, "skipping activity without a usable name");
            continue;
        };
        let class_name = format!("{}Output", name);
        let _ = writeln!(text, "\npublic class {}\n{{", class_name);
        let mut taken_outputs = HashSet::new();
        for output in &activity.outputs {
            if let Some(output_name) = unique_identifier(&output.name, &mut taken_outputs) {
                let _ = writeln!(
                    text,
                    "    public {} {} {{ get; set; }}",
                    type_text(&output.type_name),
                    output_name
                );
            }
        }
        text.push_str("}\n");
        activity_fields.push((name, class_name, activity.description.as_deref()));
    }

    let _ = writeln!(text, "\npublic class {}\n{{", ACTIVITIES_CLASS);
    for (name, class_name, description) in &activity_fields {
        write_description(&mut text, *description);
        let _ = writeln!(text, "    public {} {};", class_name, name);
    }
    text.push_str("}\n");

    GeneratedTypeBundle {
        text,
        assemblies,
        imports,
    }
}

fn write_description(text: &mut String, description: Option<&str>) {
    if let Some(description) = description {
        let _ = writeln!(text, "    [Description(\"{}\")]", escape(description));
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// A valid, not yet used identifier derived from `raw`
fn unique_identifier(raw: &str, taken: &mut HashSet<String>) -> Option<String> {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.chars().all(|c| c == '_') {
        return None;
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) || Keyword::from_ident(&name).is_some() {
        name.insert(0, '_');
    }
    if !taken.insert(name.clone()) {
        tracing::warn!(name = %name, "duplicate name in workflow schema");
        return None;
    }
    Some(name)
}

/// Type names that do not look like script types degrade to `object`
fn type_text(raw: &str) -> String {
    let raw = raw.trim();
    let well_formed = raw.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && raw
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '?'));
    if well_formed {
        raw.to_string()
    } else {
        "object".to_string()
    }
}
