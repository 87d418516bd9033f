//! Rights model for protected content

use chrono::{DateTime, Utc};
use error_common::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Usage rights understood by the SDK
pub mod rights {
    pub const OWNER: &str = "OWNER";
    pub const VIEW: &str = "VIEW";
    pub const AUDITED_EXTRACT: &str = "AUDITEDEXTRACT";
    pub const EDIT: &str = "EDIT";
    pub const EXPORT: &str = "EXPORT";
    pub const EXTRACT: &str = "EXTRACT";
    pub const PRINT: &str = "PRINT";
    pub const COMMENT: &str = "COMMENT";
    pub const REPLY: &str = "REPLY";
    pub const REPLY_ALL: &str = "REPLYALL";
    pub const FORWARD: &str = "FORWARD";

    fn owned(rights: &[&str]) -> Vec<String> {
        rights.iter().map(|r| (*r).to_string()).collect()
    }

    /// Rights that apply to e-mail
    pub fn email_rights() -> Vec<String> {
        owned(&[EXTRACT, FORWARD, OWNER, PRINT, REPLY, REPLY_ALL, VIEW])
    }

    /// Rights that apply to documents
    pub fn editable_document_rights() -> Vec<String> {
        owned(&[COMMENT, EDIT, EXTRACT, OWNER, PRINT, VIEW])
    }

    /// Rights that apply in all scenarios
    pub fn common_rights() -> Vec<String> {
        owned(&[OWNER, VIEW])
    }
}

/// Named bundles of rights
pub mod roles {
    use super::rights;

    pub const VIEWER: &str = "VIEWER";
    pub const REVIEWER: &str = "REVIEWER";
    pub const AUTHOR: &str = "AUTHOR";
    pub const CO_OWNER: &str = "COOWNER";

    pub fn rights_for_role(role: &str) -> &'static [&'static str] {
        match role.to_ascii_uppercase().as_str() {
            VIEWER => &[rights::VIEW],
            REVIEWER => &[rights::VIEW, rights::COMMENT, rights::EDIT, rights::REPLY, rights::REPLY_ALL],
            AUTHOR => &[
                rights::VIEW,
                rights::COMMENT,
                rights::EDIT,
                rights::EXTRACT,
                rights::PRINT,
                rights::REPLY,
                rights::REPLY_ALL,
                rights::FORWARD,
            ],
            CO_OWNER => &[rights::OWNER],
            _ => &[],
        }
    }
}

/// Users granted a list of rights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRights {
    pub users: Vec<String>,
    pub rights: Vec<String>,
}

impl UserRights {
    pub fn new(users: Vec<String>, rights: Vec<String>) -> Self {
        Self { users, rights }
    }
}

/// Users granted a list of roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoles {
    pub users: Vec<String>,
    pub roles: Vec<String>,
}

impl UserRoles {
    pub fn new(users: Vec<String>, roles: Vec<String>) -> Self {
        Self { users, roles }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionType {
    TemplateBased,
    Custom,
}

/// Declarative description of who may do what with protected content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionDescriptor {
    pub protection_type: ProtectionType,
    pub template_id: Option<String>,
    /// Label whose policy produced this protection
    pub label_id: Option<String>,
    pub owner: Option<String>,
    pub name: String,
    pub description: String,
    pub user_rights: Vec<UserRights>,
    pub user_roles: Vec<UserRoles>,
    pub content_valid_until: Option<DateTime<Utc>>,
    pub allow_offline_access: bool,
    pub referrer: Option<String>,
    pub encrypted_app_data: BTreeMap<String, String>,
    pub signed_app_data: BTreeMap<String, String>,
}

impl ProtectionDescriptor {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.content_valid_until.is_some_and(|until| until <= now)
    }

    /// Rights granted to `email`, upper-cased and de-duplicated
    pub fn rights_for(&self, email: &str, now: DateTime<Utc>) -> BTreeSet<String> {
        let mut granted = BTreeSet::new();
        if self.is_expired_at(now) {
            return granted;
        }

        if self.owner.as_deref().is_some_and(|owner| owner.eq_ignore_ascii_case(email)) {
            granted.insert(rights::OWNER.to_string());
        }

        for entry in &self.user_rights {
            if entry.users.iter().any(|user| user_matches(user, email)) {
                granted.extend(entry.rights.iter().map(|r| r.to_ascii_uppercase()));
            }
        }

        for entry in &self.user_roles {
            if entry.users.iter().any(|user| user_matches(user, email)) {
                for role in &entry.roles {
                    granted.extend(roles::rights_for_role(role).iter().map(|r| (*r).to_string()));
                }
            }
        }

        granted
    }

    pub(crate) fn with_owner(mut self, owner: impl Into<String>) -> Self {
        if self.owner.is_none() {
            self.owner = Some(owner.into());
        }
        self
    }

    pub(crate) fn with_label_id(mut self, label_id: Option<String>) -> Self {
        self.label_id = label_id;
        self
    }
}

/// Entries without `@` grant access to a whole domain.
fn user_matches(user: &str, email: &str) -> bool {
    if user.contains('@') {
        return user.eq_ignore_ascii_case(email);
    }
    email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.eq_ignore_ascii_case(user))
}

enum Grant {
    Rights(Vec<UserRights>),
    Roles(Vec<UserRoles>),
    Template(String),
}

/// Builds a [`ProtectionDescriptor`] from rights, roles or a template
pub struct ProtectionDescriptorBuilder {
    grant: Grant,
    name: String,
    description: String,
    label_id: Option<String>,
    content_valid_until: Option<DateTime<Utc>>,
    allow_offline_access: bool,
    referrer: Option<String>,
    encrypted_app_data: BTreeMap<String, String>,
    signed_app_data: BTreeMap<String, String>,
}

impl ProtectionDescriptorBuilder {
    fn with_grant(grant: Grant) -> Self {
        Self {
            grant,
            name: String::new(),
            description: String::new(),
            label_id: None,
            content_valid_until: None,
            allow_offline_access: true,
            referrer: None,
            encrypted_app_data: BTreeMap::new(),
            signed_app_data: BTreeMap::new(),
        }
    }

    pub fn from_user_rights(user_rights: Vec<UserRights>) -> Self {
        Self::with_grant(Grant::Rights(user_rights))
    }

    pub fn from_user_roles(user_roles: Vec<UserRoles>) -> Self {
        Self::with_grant(Grant::Roles(user_roles))
    }

    pub fn from_template(template_id: impl Into<String>) -> Self {
        Self::with_grant(Grant::Template(template_id.into()))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn label_id(mut self, label_id: impl Into<String>) -> Self {
        self.label_id = Some(label_id.into());
        self
    }

    pub fn content_valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.content_valid_until = Some(until);
        self
    }

    pub fn allow_offline_access(mut self, allow: bool) -> Self {
        self.allow_offline_access = allow;
        self
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn encrypted_app_data(mut self, data: BTreeMap<String, String>) -> Self {
        self.encrypted_app_data = data;
        self
    }

    pub fn signed_app_data(mut self, data: BTreeMap<String, String>) -> Self {
        self.signed_app_data = data;
        self
    }

    /// # Errors
    /// `BadInput` for an empty template id, or a grant without users or rights.
    pub fn build(self) -> SdkResult<ProtectionDescriptor> {
        let (protection_type, template_id, user_rights, user_roles) = match self.grant {
            Grant::Template(id) => {
                if id.trim().is_empty() {
                    return Err(SdkError::bad_input("Template id cannot be empty"));
                }
                (ProtectionType::TemplateBased, Some(id), Vec::new(), Vec::new())
            }
            Grant::Rights(entries) => {
                validate_grants(entries.iter().map(|e| (&e.users, &e.rights)), "rights")?;
                (ProtectionType::Custom, None, entries, Vec::new())
            }
            Grant::Roles(entries) => {
                validate_grants(entries.iter().map(|e| (&e.users, &e.roles)), "roles")?;
                (ProtectionType::Custom, None, Vec::new(), entries)
            }
        };

        Ok(ProtectionDescriptor {
            protection_type,
            template_id,
            label_id: self.label_id,
            owner: None,
            name: self.name,
            description: self.description,
            user_rights,
            user_roles,
            content_valid_until: self.content_valid_until,
            allow_offline_access: self.allow_offline_access,
            referrer: self.referrer,
            encrypted_app_data: self.encrypted_app_data,
            signed_app_data: self.signed_app_data,
        })
    }
}

fn validate_grants<'a>(
    grants: impl Iterator<Item = (&'a Vec<String>, &'a Vec<String>)>,
    what: &str,
) -> SdkResult<()> {
    let mut count = 0usize;
    for (users, granted) in grants {
        count = count.saturating_add(1);
        if users.iter().all(|u| u.trim().is_empty()) {
            return Err(SdkError::bad_input(format!("Every {what} entry needs at least one user")));
        }
        if granted.iter().all(|r| r.trim().is_empty()) {
            return Err(SdkError::bad_input(format!("Every {what} entry needs at least one of its {what}")));
        }
    }
    if count == 0 {
        return Err(SdkError::bad_input(format!("At least one {what} entry is required")));
    }
    Ok(())
}

/// Protection of one content item as seen by one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionHandler {
    descriptor: ProtectionDescriptor,
    content_id: String,
    issued_to: String,
    rights: Vec<String>,
}

impl ProtectionHandler {
    pub(crate) fn new(descriptor: ProtectionDescriptor, content_id: impl Into<String>, issued_to: &str) -> Self {
        let rights = descriptor.rights_for(issued_to, Utc::now()).into_iter().collect();
        Self {
            descriptor,
            content_id: content_id.into(),
            issued_to: issued_to.to_string(),
            rights,
        }
    }

    pub fn descriptor(&self) -> &ProtectionDescriptor {
        &self.descriptor
    }

    pub fn rights(&self) -> &[String] {
        &self.rights
    }

    /// `OWNER` implies every other right.
    pub fn access_check(&self, right: &str) -> bool {
        self.rights
            .iter()
            .any(|r| r == rights::OWNER || r.eq_ignore_ascii_case(right))
    }

    pub fn issued_to(&self) -> &str {
        &self.issued_to
    }

    pub fn owner(&self) -> Option<&str> {
        self.descriptor.owner.as_deref()
    }

    pub fn is_issued_to_owner(&self) -> bool {
        self.owner().is_some_and(|owner| owner.eq_ignore_ascii_case(&self.issued_to))
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn content_valid_until(&self) -> Option<DateTime<Utc>> {
        self.descriptor.content_valid_until
    }
}
