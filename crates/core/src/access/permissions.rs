use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// Actions a portal user may be permitted to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewOwnRecords,
    ViewOwnAppointments,
    BookAppointments,
    CancelOwnAppointments,
    ViewOwnPrescriptions,
    MessageProviders,
    ManageOwnProfile,
    ViewPatientRecords,
    EditPatientRecords,
    ViewSchedule,
    ManageAppointments,
    WritePrescriptions,
    MessagePatients,
    ManageUsers,
    ManageProviders,
    AssignRoles,
    ViewAuditLogs,
    ViewReports,
    ManageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub const ALL: [Self; 19] = [
        Self::ViewOwnRecords,
        Self::ViewOwnAppointments,
        Self::BookAppointments,
        Self::CancelOwnAppointments,
        Self::ViewOwnPrescriptions,
        Self::MessageProviders,
        Self::ManageOwnProfile,
        Self::ViewPatientRecords,
        Self::EditPatientRecords,
        Self::ViewSchedule,
        Self::ManageAppointments,
        Self::WritePrescriptions,
        Self::MessagePatients,
        Self::ManageUsers,
        Self::ManageProviders,
        Self::AssignRoles,
        Self::ViewAuditLogs,
        Self::ViewReports,
        Self::ManageSettings,
    ];

    /// Wire name, as sent by the server and used in route guards
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewOwnRecords => "view_own_records",
            Self::ViewOwnAppointments => "view_own_appointments",
            Self::BookAppointments => "book_appointments",
            Self::CancelOwnAppointments => "cancel_own_appointments",
            Self::ViewOwnPrescriptions => "view_own_prescriptions",
            Self::MessageProviders => "message_providers",
            Self::ManageOwnProfile => "manage_own_profile",
            Self::ViewPatientRecords => "view_patient_records",
            Self::EditPatientRecords => "edit_patient_records",
            Self::ViewSchedule => "view_schedule",
            Self::ManageAppointments => "manage_appointments",
            Self::WritePrescriptions => "write_prescriptions",
            Self::MessagePatients => "message_patients",
            Self::ManageUsers => "manage_users",
            Self::ManageProviders => "manage_providers",
            Self::AssignRoles => "assign_roles",
            Self::ViewAuditLogs => "view_audit_logs",
            Self::ViewReports => "view_reports",
            Self::ManageSettings => "manage_settings",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}
