//! Persisted entity types.
//!
//! Every entity lives in one named collection, stored as a JSON array. Field
//! names are camelCase on the wire so existing collections written by the
//! mobile client load unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The named collections held by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    /// Onboarded employees.
    Employees,
    /// Doctors and their registered locations.
    Doctors,
    /// Visit quotas assigned to employees.
    Assignments,
    /// Recorded visits.
    CheckIns,
}

impl Collection {
    /// All collections, in a stable order.
    pub const ALL: [Self; 4] = [
        Self::Employees,
        Self::Doctors,
        Self::Assignments,
        Self::CheckIns,
    ];

    /// The collection name used to build storage keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employees => "employees",
            Self::Doctors => "doctors",
            Self::Assignments => "assignments",
            Self::CheckIns => "checkIns",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employees" => Ok(Self::Employees),
            "doctors" => Ok(Self::Doctors),
            "assignments" => Ok(Self::Assignments),
            "checkIns" | "check-ins" | "check_ins" => Ok(Self::CheckIns),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}

/// A record type that can be persisted in the local store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection this record type lives in.
    const COLLECTION: Collection;

    /// The record's identifier, unique within its collection by convention.
    fn id(&self) -> &str;
}

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that both coordinates are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// A field employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Role within the organisation.
    #[serde(default)]
    pub role: String,
}

impl Record for Employee {
    const COLLECTION: Collection = Collection::Employees;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A doctor that employees visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Medical specialization.
    #[serde(default)]
    pub specialization: String,
    /// Registered practice location.
    pub location: Location,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Record for Doctor {
    const COLLECTION: Collection = Collection::Doctors;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    /// Work in progress.
    #[default]
    Active,
    /// Target reached and closed by an admin or caller.
    Completed,
    /// Withdrawn before completion.
    Cancelled,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A visit quota an employee owes toward a doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Identifier.
    pub id: String,
    /// Employee responsible for the visits.
    pub employee_id: String,
    /// Doctor to visit.
    pub doctor_id: String,
    /// Number of visits owed.
    pub target: u32,
    /// When the assignment was made.
    pub assigned_date: DateTime<Utc>,
    /// Admin who made the assignment.
    pub assigned_by: String,
    /// Lifecycle state.
    #[serde(default)]
    pub status: AssignmentStatus,
    /// Visits counted so far.
    #[serde(default)]
    pub current_progress: u32,
}

impl Assignment {
    /// Whether progress has reached the target.
    #[must_use]
    pub fn is_target_met(&self) -> bool {
        self.current_progress >= self.target
    }
}

impl Record for Assignment {
    const COLLECTION: Collection = Collection::Assignments;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields of an assignment that may be changed after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssignmentStatus>,
    /// New progress value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_progress: Option<u32>,
    /// New target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// A recorded visit of an employee to a doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    /// Identifier.
    pub id: String,
    /// Employee who checked in.
    pub employee_id: String,
    /// Doctor visited.
    pub doctor_id: String,
    /// When the check-in happened.
    pub timestamp: DateTime<Utc>,
    /// Where the employee was at check-in time.
    pub location: Location,
    /// Free-form visit notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Record for CheckIn {
    const COLLECTION: Collection = Collection::CheckIns;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields of a check-in that may be changed after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPatch {
    /// Corrected timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Corrected location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Replacement notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
