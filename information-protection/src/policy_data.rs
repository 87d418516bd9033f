//! Policy documents: label hierarchy, templates and tenant settings
//!
//! Documents are JSON or YAML. A document is compiled into a [`Policy`]
//! once per engine; the compiled label tree is shared read-only from then on.

use crate::action::{ContentMarkAlignment, WatermarkLayout};
use crate::label::{Label, LabelTree};
use crate::protection::UserRights;
use error_common::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    pub policy_id: Option<String>,
    pub more_info_url: Option<String>,
    /// Content must carry a label
    pub mandatory: bool,
    pub require_downgrade_justification: bool,
    pub default_label_id: Option<String>,
    pub labels: Vec<LabelDefinition>,
    pub templates: Vec<TemplateDefinition>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            policy_id: None,
            more_info_url: None,
            mandatory: false,
            require_downgrade_justification: true,
            default_label_id: None,
            labels: Vec::new(),
            templates: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub sensitivity: i32,
    #[serde(default)]
    pub tooltip: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<ContentMarkingDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<ContentMarkingDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<LabelProtection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_actions: Vec<CustomActionDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LabelDefinition>,
}

impl LabelDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sensitivity: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color: String::new(),
            sensitivity,
            tooltip: String::new(),
            active: true,
            header: None,
            footer: None,
            watermark: None,
            protection: None,
            custom_actions: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: LabelDefinition) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_header(mut self, text: impl Into<String>) -> Self {
        self.header = Some(ContentMarkingDefinition::new(text));
        self
    }

    pub fn with_footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(ContentMarkingDefinition::new(text));
        self
    }

    pub fn with_watermark(mut self, text: impl Into<String>) -> Self {
        self.watermark = Some(WatermarkDefinition::new(text));
        self
    }

    pub fn with_protection(mut self, protection: LabelProtection) -> Self {
        self.protection = Some(protection);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarkingDefinition {
    pub text: String,
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default = "default_mark_font_size")]
    pub font_size: u32,
    #[serde(default = "default_mark_color")]
    pub font_color: String,
    #[serde(default)]
    pub alignment: ContentMarkAlignment,
    #[serde(default)]
    pub margin: u32,
}

impl ContentMarkingDefinition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_name: default_font_name(),
            font_size: default_mark_font_size(),
            font_color: default_mark_color(),
            alignment: ContentMarkAlignment::default(),
            margin: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkDefinition {
    pub text: String,
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default = "default_watermark_font_size")]
    pub font_size: u32,
    #[serde(default = "default_watermark_color")]
    pub font_color: String,
    #[serde(default)]
    pub layout: WatermarkLayout,
}

impl WatermarkDefinition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_name: default_font_name(),
            font_size: default_watermark_font_size(),
            font_color: default_watermark_color(),
            layout: WatermarkLayout::default(),
        }
    }
}

fn default_font_name() -> String {
    "Calibri".to_string()
}

fn default_mark_font_size() -> u32 {
    10
}

fn default_mark_color() -> String {
    "#000000".to_string()
}

fn default_watermark_font_size() -> u32 {
    36
}

fn default_watermark_color() -> String {
    "#C0C0C0".to_string()
}

/// Protection a label applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelProtection {
    Template { template_id: String },
    Adhoc,
    DoNotForward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomActionDefinition {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub user_rights: Vec<UserRights>,
}

impl PolicyDocument {
    /// Parses JSON when the text starts with `{`, YAML otherwise.
    pub fn parse(text: &str) -> SdkResult<Self> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') {
            serde_json::from_str(trimmed)
                .map_err(|e| SdkError::bad_input(format!("Invalid policy document: {e}")))
        } else {
            serde_yaml::from_str(trimmed)
                .map_err(|e| SdkError::bad_input(format!("Invalid policy document: {e}")))
        }
    }

    pub fn from_file(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SdkError::from(e).with_context("path", path.display().to_string())
        })?;
        Self::parse(&text)
    }

    pub fn to_json_pretty(&self) -> SdkResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SdkError::internal(format!("Failed to serialize policy: {e}")))
    }

    /// Checks cross references; label ids are checked when the tree is built.
    pub fn validate(&self) -> SdkResult<()> {
        let mut template_ids = HashSet::new();
        for template in &self.templates {
            if template.id.trim().is_empty() {
                return Err(SdkError::bad_input("Template id cannot be empty"));
            }
            if !template_ids.insert(template.id.as_str()) {
                return Err(SdkError::bad_input(format!("Duplicate template id '{}'", template.id)));
            }
        }

        let mut pending: Vec<&LabelDefinition> = self.labels.iter().collect();
        while let Some(label) = pending.pop() {
            if let Some(LabelProtection::Template { template_id }) = &label.protection {
                if !template_ids.contains(template_id.as_str()) {
                    return Err(SdkError::bad_input(format!(
                        "Label '{}' references unknown template '{template_id}'",
                        label.id
                    )));
                }
            }
            pending.extend(label.children.iter());
        }

        Ok(())
    }
}

/// Compiled, immutable form of a [`PolicyDocument`]
#[derive(Debug)]
pub struct Policy {
    document: PolicyDocument,
    labels: Arc<LabelTree>,
    templates: BTreeMap<String, TemplateDefinition>,
}

impl Policy {
    pub fn compile(document: PolicyDocument) -> SdkResult<Self> {
        document.validate()?;
        let labels = LabelTree::build(&document.labels)?;

        if let Some(default_id) = &document.default_label_id {
            if labels.label(default_id).is_none() {
                return Err(SdkError::bad_input(format!("Default label '{default_id}' is not defined")));
            }
        }

        let templates = document
            .templates
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();

        Ok(Self {
            document,
            labels,
            templates,
        })
    }

    /// Policy without labels, for protection-only engines
    pub fn empty() -> Self {
        Self {
            document: PolicyDocument::default(),
            labels: Arc::new(LabelTree::default()),
            templates: BTreeMap::new(),
        }
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    pub fn labels(&self) -> &Arc<LabelTree> {
        &self.labels
    }

    pub fn label(&self, id: &str) -> Option<Label> {
        self.labels.label(id)
    }

    pub fn template(&self, id: &str) -> Option<&TemplateDefinition> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &TemplateDefinition> {
        self.templates.values()
    }

    pub fn default_label(&self) -> Option<Label> {
        self.document
            .default_label_id
            .as_deref()
            .and_then(|id| self.labels.label(id))
    }

    pub fn more_info_url(&self) -> Option<&str> {
        self.document.more_info_url.as_deref()
    }

    pub fn is_labeling_required(&self) -> bool {
        self.document.mandatory
    }

    pub fn requires_downgrade_justification(&self) -> bool {
        self.document.require_downgrade_justification
    }
}
