//! Capability vocabulary: modules, actions and resolved permission sets.
//!
//! Both modules and actions are closed enums. A capability string that does
//! not name a known module/action pair fails to parse and is therefore never
//! granted.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Functional area of the school platform that permissions are granted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Students,
    Teachers,
    Departments,
    Subjects,
    Workload,
    Classes,
    Attendance,
    Fees,
    Exams,
    Timetable,
    Transport,
    Messaging,
    Payments,
    Reports,
    Roles,
    AuditLogs,
    Settings,
}

impl Module {
    pub const ALL: [Module; 17] = [
        Module::Students,
        Module::Teachers,
        Module::Departments,
        Module::Subjects,
        Module::Workload,
        Module::Classes,
        Module::Attendance,
        Module::Fees,
        Module::Exams,
        Module::Timetable,
        Module::Transport,
        Module::Messaging,
        Module::Payments,
        Module::Reports,
        Module::Roles,
        Module::AuditLogs,
        Module::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Students => "students",
            Module::Teachers => "teachers",
            Module::Departments => "departments",
            Module::Subjects => "subjects",
            Module::Workload => "workload",
            Module::Classes => "classes",
            Module::Attendance => "attendance",
            Module::Fees => "fees",
            Module::Exams => "exams",
            Module::Timetable => "timetable",
            Module::Transport => "transport",
            Module::Messaging => "messaging",
            Module::Payments => "payments",
            Module::Reports => "reports",
            Module::Roles => "roles",
            Module::AuditLogs => "audit_logs",
            Module::Settings => "settings",
        }
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CapabilityParseError::UnknownModule(s.to_string()))
    }
}

/// Operation kind a capability grants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Add,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Add, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" | "read" => Ok(Action::View),
            "add" | "create" => Ok(Action::Add),
            "edit" | "update" => Ok(Action::Edit),
            "delete" | "remove" => Ok(Action::Delete),
            other => Err(CapabilityParseError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityParseError {
    #[error("capability must have the form '<module>:<action>', got '{0}'")]
    Malformed(String),

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// A (module, action) pair, written `"<module>:<action>"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    pub module: Module,
    pub action: Action,
}

impl Capability {
    pub const fn new(module: Module, action: Action) -> Self {
        Self { module, action }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.module, self.action)
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, action) = s
            .split_once(':')
            .ok_or_else(|| CapabilityParseError::Malformed(s.to_string()))?;
        Ok(Self {
            module: module.trim().parse()?,
            action: action.trim().parse()?,
        })
    }
}

/// The four resolved booleans for one module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl PermissionSet {
    pub const DENY_ALL: PermissionSet = PermissionSet::new(false, false, false, false);
    pub const ALLOW_ALL: PermissionSet = PermissionSet::new(true, true, true, true);
    pub const VIEW_ONLY: PermissionSet = PermissionSet::new(true, false, false, false);
    /// View, add and edit; no delete.
    pub const CONTRIBUTE: PermissionSet = PermissionSet::new(true, true, true, false);

    pub const fn new(can_view: bool, can_add: bool, can_edit: bool, can_delete: bool) -> Self {
        Self {
            can_view,
            can_add,
            can_edit,
            can_delete,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Add => self.can_add,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_alias_actions() {
        let cap: Capability = "fees:add".parse().unwrap();
        assert_eq!(cap, Capability::new(Module::Fees, Action::Add));

        let cap: Capability = "fees:read".parse().unwrap();
        assert_eq!(cap, Capability::new(Module::Fees, Action::View));

        let cap: Capability = "audit_logs:view".parse().unwrap();
        assert_eq!(cap.module, Module::AuditLogs);
    }

    #[test]
    fn rejects_typos_instead_of_guessing() {
        assert!(matches!(
            "feez:add".parse::<Capability>(),
            Err(CapabilityParseError::UnknownModule(_))
        ));
        assert!(matches!(
            "fees:approve".parse::<Capability>(),
            Err(CapabilityParseError::UnknownAction(_))
        ));
        assert!(matches!(
            "fees".parse::<Capability>(),
            Err(CapabilityParseError::Malformed(_))
        ));
    }

    #[test]
    fn display_matches_parse_format() {
        for module in Module::ALL {
            for action in Action::ALL {
                let cap = Capability::new(module, action);
                assert_eq!(cap.to_string().parse::<Capability>().unwrap(), cap);
            }
        }
    }

    #[test]
    fn missing_booleans_deserialize_as_deny() {
        let set: PermissionSet = serde_json::from_str(r#"{"can_view": true}"#).unwrap();
        assert_eq!(set, PermissionSet::VIEW_ONLY);
    }
}
