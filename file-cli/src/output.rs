//! Text rendering and output naming

use information_protection::protection::ProtectionType;
use information_protection::{ContentLabel, Label, ProtectionHandler};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const DESCRIPTION_LIMIT: usize = 70;
const PROTECTED_SUFFIX: &str = ".pfile";

/// `<stem>_modified<ext>` next to `input`; a `.pfile` suffix stays attached to the real extension.
pub fn modified_output_path(input: &Path, output_file_name: &str) -> PathBuf {
    let (stem, extension) = match split_extension(output_file_name) {
        (stem, ext) if ext.eq_ignore_ascii_case(PROTECTED_SUFFIX) => {
            let (inner_stem, inner_ext) = split_extension(stem);
            (inner_stem, format!("{inner_ext}{ext}"))
        }
        (stem, ext) => (stem, ext.to_string()),
    };

    let name = format!("{stem}_modified{extension}");
    match input.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    }
}

pub fn truncate_description(description: &str) -> String {
    if description.chars().count() < DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let mut truncated: String = description.chars().take(DESCRIPTION_LIMIT).collect();
    truncated.push_str("...");
    truncated
}

/// Labels and their children, indented two spaces per level.
pub fn render_labels(labels: &[Label]) -> String {
    let mut text = String::new();
    render_level(&mut text, labels, "");
    text
}

fn render_level(text: &mut String, labels: &[Label], indent: &str) {
    for label in labels {
        let _ = writeln!(text, "{indent}Label ID: {}", label.id());
        let _ = writeln!(text, "{indent}Label name: {}", label.name());
        let _ = writeln!(text, "{indent}Label description: {}", truncate_description(label.description()));
        text.push('\n');

        let children = label.children();
        if !children.is_empty() {
            let _ = writeln!(text, "{indent}Child labels:");
            render_level(text, &children, &format!("{indent}  "));
        }
    }
}

pub fn render_status(label: Option<&ContentLabel>, protection: Option<&ProtectionHandler>) -> String {
    let mut text = String::new();
    if label.is_none() && protection.is_none() {
        text.push_str("File is neither labeled nor protected\n");
        return text;
    }

    match label {
        Some(content_label) => {
            let current = &content_label.label;
            let _ = writeln!(text, "File is labeled as: {}", current.name());
            let _ = writeln!(text, "Id: {}", current.id());
            if let Some(parent) = current.parent() {
                let _ = writeln!(text, "Parent label: {}", parent.name());
                let _ = writeln!(text, "Parent Id: {}", parent.id());
            }
            let _ = writeln!(text, "Set time: {}", content_label.creation_time.to_rfc3339());
            let _ = writeln!(text, "Assignment method: {}", content_label.assignment_method);
            if !content_label.extended_properties.is_empty() {
                text.push_str("Extended Properties:\n");
                for (key, value) in &content_label.extended_properties {
                    let _ = writeln!(text, "Key: {key}, Value: {value}");
                }
            }
        }
        None => text.push_str("File is not labeled\n"),
    }

    if let Some(handler) = protection {
        let descriptor = handler.descriptor();
        match descriptor.protection_type {
            ProtectionType::TemplateBased => text.push_str("File is protected with template.\n"),
            ProtectionType::Custom => text.push_str("File is protected with custom permissions.\n"),
        }
        let _ = writeln!(text, "Name: {}", descriptor.name);
        let _ = writeln!(text, "Template Id: {}", descriptor.template_id.as_deref().unwrap_or(""));
        if let Some(owner) = handler.owner() {
            let _ = writeln!(text, "Owner: {owner}");
        }
        for grant in &descriptor.user_rights {
            let _ = writeln!(text, "Rights: {}", grant.rights.join(", "));
            let _ = writeln!(text, "For Users: {}", grant.users.join("; "));
        }
        let _ = writeln!(text, "Your rights: {}", handler.rights().join(", "));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use information_protection::{LabelDefinition, Policy, PolicyDocument};

    #[test]
    fn test_modified_output_names() {
        let input = Path::new("/data/in/plan.docx");
        assert_eq!(
            modified_output_path(input, "plan.docx"),
            PathBuf::from("/data/in/plan_modified.docx")
        );
        assert_eq!(
            modified_output_path(input, "plan.docx.pfile"),
            PathBuf::from("/data/in/plan_modified.docx.pfile")
        );
        assert_eq!(modified_output_path(Path::new("README"), "README"), PathBuf::from("README_modified"));
        assert_eq!(
            modified_output_path(Path::new("notes.PFILE"), "notes.PFILE"),
            PathBuf::from("notes_modified.PFILE")
        );
    }

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate_description("short"), "short");

        let exact = "x".repeat(70);
        assert_eq!(truncate_description(&exact), format!("{exact}..."));

        let long = "é".repeat(100);
        let truncated = truncate_description(&long);
        assert_eq!(truncated.chars().count(), 73);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_render_labels_indents_children() {
        let mut document = PolicyDocument::default();
        document.labels = vec![LabelDefinition::new("A", "Alpha", 1)
            .with_child(LabelDefinition::new("B", "Beta", 2).with_child(LabelDefinition::new("C", "Gamma", 3)))];
        let policy = Policy::compile(document).unwrap();

        let text = render_labels(&policy.labels().roots());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first().copied(), Some("Label ID: A"));
        assert!(lines.contains(&"Child labels:"));
        assert!(lines.contains(&"  Label ID: B"));
        assert!(lines.contains(&"  Child labels:"));
        assert!(lines.contains(&"    Label name: Gamma"));
    }

    #[test]
    fn test_render_status_without_label_or_protection() {
        assert_eq!(render_status(None, None), "File is neither labeled nor protected\n");
    }
}
