use super::permissions::Permission;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// Portal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Provider,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Canonical spelling of a role name: trimmed and lowercase
pub fn normalize_role(role: &str) -> String {
    role.trim().to_lowercase()
}

const PATIENT_PERMISSIONS: &[Permission] = &[
    Permission::ViewOwnRecords,
    Permission::ViewOwnAppointments,
    Permission::BookAppointments,
    Permission::CancelOwnAppointments,
    Permission::ViewOwnPrescriptions,
    Permission::MessageProviders,
    Permission::ManageOwnProfile,
];

const PROVIDER_PERMISSIONS: &[Permission] = &[
    Permission::ViewPatientRecords,
    Permission::EditPatientRecords,
    Permission::ViewSchedule,
    Permission::ManageAppointments,
    Permission::WritePrescriptions,
    Permission::MessagePatients,
    Permission::ManageOwnProfile,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewPatientRecords,
    Permission::ViewSchedule,
    Permission::ManageAppointments,
    Permission::ManageUsers,
    Permission::ManageProviders,
    Permission::AssignRoles,
    Permission::ViewAuditLogs,
    Permission::ViewReports,
    Permission::ManageSettings,
    Permission::ManageOwnProfile,
];

impl Role {
    pub const ALL: [Self; 3] = [Self::Patient, Self::Provider, Self::Admin];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Provider => "provider",
            Self::Admin => "admin",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the table
    pub fn parse(role: &str) -> Option<Self> {
        match normalize_role(role).as_str() {
            "patient" => Some(Self::Patient),
            "provider" => Some(Self::Provider),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Permissions granted to this role
    pub const fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Patient => PATIENT_PERMISSIONS,
            Self::Provider => PROVIDER_PERMISSIONS,
            Self::Admin => ADMIN_PERMISSIONS,
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}
