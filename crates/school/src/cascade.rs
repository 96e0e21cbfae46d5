//! Declarative cascade and pre-delete guard rules.
//!
//! References between collections are plain nullable id fields; nothing in
//! the store enforces them. These tables say, per parent kind, which
//! dependents point at it and what happens to them when the parent goes
//! away. Interpretation against a concrete store lives in `campus-infra`.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use campus_core::{DomainError, Entity};

use crate::{Department, FacultyWorkload, Student, Subject, Teacher, TransportVehicle};

/// Entity kinds whose lifecycle changes reach other collections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Teacher,
    Student,
    Department,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentKind::Teacher => "teacher",
            ParentKind::Student => "student",
            ParentKind::Department => "department",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            ParentKind::Teacher => Teacher::COLLECTION,
            ParentKind::Student => Student::COLLECTION,
            ParentKind::Department => Department::COLLECTION,
        }
    }
}

impl core::fmt::Display for ParentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" | "teachers" => Ok(ParentKind::Teacher),
            "student" | "students" => Ok(ParentKind::Student),
            "department" | "departments" => Ok(ParentKind::Department),
            other => Err(DomainError::validation(format!("unknown parent kind '{other}'"))),
        }
    }
}

/// Collections that hold references to a parent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentKind {
    Subject,
    FacultyWorkload,
    TransportVehicle,
    Teacher,
}

impl DependentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependentKind::Subject => "subject",
            DependentKind::FacultyWorkload => "faculty_workload",
            DependentKind::TransportVehicle => "transport_vehicle",
            DependentKind::Teacher => "teacher",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            DependentKind::Subject => Subject::COLLECTION,
            DependentKind::FacultyWorkload => FacultyWorkload::COLLECTION,
            DependentKind::TransportVehicle => TransportVehicle::COLLECTION,
            DependentKind::Teacher => Teacher::COLLECTION,
        }
    }

    /// Whether records of this kind carry an `updated_at` stamp.
    pub fn tracks_updates(&self) -> bool {
        !matches!(self, DependentKind::FacultyWorkload)
    }
}

impl core::fmt::Display for DependentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dependent record points at its parent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Scalar id field equal to the parent id.
    Field(&'static str),
    /// Array field containing the parent id.
    ArrayMember(&'static str),
}

impl Reference {
    pub fn field(&self) -> &'static str {
        match self {
            Reference::Field(f) | Reference::ArrayMember(f) => f,
        }
    }
}

/// Value a nullified field is reset to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cleared {
    Null,
    EmptyString,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CascadeAction {
    /// Reset the listed fields (the reference field among them).
    Nullify { fields: &'static [(&'static str, Cleared)] },
    /// Remove matching dependent records.
    Delete,
    /// Remove the parent id from the referencing array.
    Pull,
}

/// One parent → dependent rule.
///
/// Every rule is idempotent: once applied, its match filter no longer
/// selects any record, so re-running it touches nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CascadeRule {
    pub parent: ParentKind,
    pub dependent: DependentKind,
    pub reference: Reference,
    /// Only touch dependents whose `active` flag is true.
    pub only_active: bool,
    pub action: CascadeAction,
}

impl CascadeRule {
    pub fn name(&self) -> String {
        format!("{}->{}", self.parent, self.dependent)
    }
}

const CASCADE_RULES: &[CascadeRule] = &[
    CascadeRule {
        parent: ParentKind::Teacher,
        dependent: DependentKind::Subject,
        reference: Reference::Field("teacher_id"),
        only_active: true,
        action: CascadeAction::Nullify {
            fields: &[("teacher_id", Cleared::Null), ("teacher_name", Cleared::EmptyString)],
        },
    },
    CascadeRule {
        parent: ParentKind::Teacher,
        dependent: DependentKind::FacultyWorkload,
        reference: Reference::Field("teacher_id"),
        only_active: false,
        action: CascadeAction::Delete,
    },
    CascadeRule {
        parent: ParentKind::Department,
        dependent: DependentKind::Subject,
        reference: Reference::Field("department_id"),
        only_active: false,
        action: CascadeAction::Nullify {
            fields: &[("department_id", Cleared::Null), ("department_name", Cleared::EmptyString)],
        },
    },
    CascadeRule {
        parent: ParentKind::Department,
        dependent: DependentKind::FacultyWorkload,
        reference: Reference::Field("department_id"),
        only_active: false,
        action: CascadeAction::Nullify {
            fields: &[("department_id", Cleared::Null)],
        },
    },
    CascadeRule {
        parent: ParentKind::Department,
        dependent: DependentKind::Teacher,
        reference: Reference::Field("department_id"),
        only_active: false,
        action: CascadeAction::Nullify {
            fields: &[("department_id", Cleared::Null)],
        },
    },
    CascadeRule {
        parent: ParentKind::Student,
        dependent: DependentKind::TransportVehicle,
        reference: Reference::ArrayMember("assigned_students"),
        only_active: false,
        action: CascadeAction::Pull,
    },
];

/// Rules that fire when a `parent` is deactivated or deleted.
pub fn cascade_rules(parent: ParentKind) -> impl Iterator<Item = &'static CascadeRule> {
    CASCADE_RULES.iter().filter(move |r| r.parent == parent)
}

/// A dependent type whose active records block a parent's hard delete.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeleteGuardRule {
    pub parent: ParentKind,
    pub dependent: DependentKind,
    pub reference: Reference,
    pub hint: &'static str,
}

impl DeleteGuardRule {
    /// Human-readable blocking reason for `count` active dependents.
    pub fn blocking_reason(&self, count: u64) -> String {
        let noun = match (self.dependent, count) {
            (DependentKind::Subject, 1) => "active subject",
            (DependentKind::Subject, _) => "active subjects",
            (DependentKind::FacultyWorkload, 1) => "workload record",
            (DependentKind::FacultyWorkload, _) => "workload records",
            (DependentKind::TransportVehicle, 1) => "active vehicle",
            (DependentKind::TransportVehicle, _) => "active vehicles",
            (DependentKind::Teacher, 1) => "active teacher",
            (DependentKind::Teacher, _) => "active teachers",
        };
        let verb = if count == 1 { "references" } else { "reference" };
        format!(
            "cannot delete {}: {count} {noun} still {verb} it. {}",
            self.parent, self.hint
        )
    }
}

const DELETE_GUARDS: &[DeleteGuardRule] = &[DeleteGuardRule {
    parent: ParentKind::Department,
    dependent: DependentKind::Subject,
    reference: Reference::Field("department_id"),
    hint: "Reassign or deactivate those subjects first.",
}];

/// Guards checked before a hard delete of `parent`.
pub fn delete_guards(parent: ParentKind) -> impl Iterator<Item = &'static DeleteGuardRule> {
    DELETE_GUARDS.iter().filter(move |g| g.parent == parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teacher_rules_cover_subjects_and_workloads() {
        let rules: Vec<_> = cascade_rules(ParentKind::Teacher).collect();
        assert_eq!(rules.len(), 2);

        let subject = rules.iter().find(|r| r.dependent == DependentKind::Subject).unwrap();
        assert!(subject.only_active);
        assert!(matches!(subject.action, CascadeAction::Nullify { .. }));

        let workload = rules
            .iter()
            .find(|r| r.dependent == DependentKind::FacultyWorkload)
            .unwrap();
        assert_eq!(workload.action, CascadeAction::Delete);
    }

    #[test]
    fn nullify_rules_always_clear_their_reference_field() {
        for rule in CASCADE_RULES {
            if let CascadeAction::Nullify { fields } = rule.action {
                assert!(
                    fields.iter().any(|(f, c)| *f == rule.reference.field() && *c == Cleared::Null),
                    "{} would not stop matching after it runs",
                    rule.name()
                );
            }
        }
    }

    #[test]
    fn student_rule_pulls_from_roster() {
        let rule = cascade_rules(ParentKind::Student).next().unwrap();
        assert_eq!(rule.reference, Reference::ArrayMember("assigned_students"));
        assert_eq!(rule.action, CascadeAction::Pull);
    }

    #[test]
    fn blocking_reason_names_count_and_remedy() {
        let guard = delete_guards(ParentKind::Department).next().unwrap();
        let reason = guard.blocking_reason(2);
        assert!(reason.contains('2'));
        assert!(reason.contains("active subjects"));
        assert!(reason.contains("Reassign"));
    }

    #[test]
    fn blocking_reason_agrees_with_its_count() {
        let guard = delete_guards(ParentKind::Department).next().unwrap();
        assert!(guard.blocking_reason(1).contains("1 active subject still references it"));
        assert!(guard.blocking_reason(3).contains("3 active subjects still reference it"));
    }

    #[test]
    fn parent_kind_parses_singular_and_plural() {
        assert_eq!("teachers".parse::<ParentKind>().unwrap(), ParentKind::Teacher);
        assert_eq!("department".parse::<ParentKind>().unwrap(), ParentKind::Department);
        assert!("bus".parse::<ParentKind>().is_err());
    }
}
