//! Derived statistics over assignments and check-ins.
//!
//! Nothing here is persisted. Each aggregation reads the collections once and
//! indexes them by employee id, so cost is linear in the collection sizes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Assignment, AssignmentStatus, CheckIn, Employee};
use crate::repository::{AssignmentRepository, CheckInRepository, EmployeeRepository};
use crate::store::LocalStore;

/// Length of the trailing window used for the check-in rate.
pub const TRAILING_WINDOW_DAYS: i64 = 30;

/// Name reported for employees missing from the employee collection.
const UNKNOWN_EMPLOYEE: &str = "Unknown";

/// Performance summary for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeAnalytics {
    /// Employee id.
    pub employee_id: String,
    /// Employee display name.
    pub employee_name: String,
    /// Assignments held.
    pub total_assignments: usize,
    /// Assignments with status `completed`.
    pub completed_assignments: usize,
    /// Check-ins ever recorded.
    pub total_check_ins: usize,
    /// Check-ins per day over the trailing window.
    pub average_check_ins_per_day: f64,
    /// Most recent check-in.
    pub last_check_in: Option<DateTime<Utc>>,
    /// Check-ins as a percentage of the summed targets.
    pub target_achievement_rate: f64,
}

/// Reporting period of a roundup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundupPeriod {
    /// The current local calendar day.
    Daily,
    /// The seven days up to now.
    Weekly,
}

impl fmt::Display for RoundupPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for RoundupPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown roundup period: {other}")),
        }
    }
}

/// One employee's activity inside a roundup window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeActivity {
    /// Employee id.
    pub employee_id: String,
    /// Employee display name.
    pub employee_name: String,
    /// Check-ins inside the window.
    pub check_ins: usize,
    /// Assignments whose progress has reached the target. Not windowed.
    pub targets_achieved: usize,
    /// Distinct doctors visited inside the window, in first-visit order.
    pub doctors_visited: Vec<String>,
}

/// Snapshot of every employee's activity for a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRoundup {
    /// Random identifier.
    pub id: Uuid,
    /// Admin the roundup is addressed to.
    pub admin_id: String,
    /// Reporting period.
    pub period: RoundupPeriod,
    /// Inclusive window start.
    pub window_start: DateTime<Utc>,
    /// Inclusive window end.
    pub window_end: DateTime<Utc>,
    /// When the roundup was generated.
    pub generated_at: DateTime<Utc>,
    /// Check-ins inside the window across all employees.
    pub total_check_ins: usize,
    /// Employees with at least one check-in inside the window.
    pub active_employees: usize,
    /// Per-employee breakdown, in employee collection order.
    pub employees: Vec<EmployeeActivity>,
}

/// Inclusive `[start, end]` bounds of a roundup period ending at `now`.
///
/// `Daily` spans the calendar day of `now` in its own time zone, from
/// 00:00:00.000 to 23:59:59.999. `Weekly` spans the seven days before `now`.
#[must_use]
pub fn roundup_window<Tz: TimeZone>(
    period: RoundupPeriod,
    now: &DateTime<Tz>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match period {
        RoundupPeriod::Daily => {
            let tz = now.timezone();
            let day = now.date_naive();
            let start = day_start(&tz, day);
            let end = day
                .succ_opt()
                .map_or_else(|| now.with_timezone(&Utc), |next| day_start(&tz, next))
                - Duration::milliseconds(1);
            (start, end)
        }
        RoundupPeriod::Weekly => {
            let end = now.with_timezone(&Utc);
            (end - Duration::days(7), end)
        }
    }
}

/// First instant of `day` in `tz`, stepping past a DST gap at midnight.
fn day_start<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = NaiveDateTime::from(day);
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map_or_else(
            || Utc.from_utc_datetime(&midnight),
            |start| start.with_timezone(&Utc),
        )
}

fn index_by_employee<'a, T>(
    records: &'a [T],
    employee_id: impl Fn(&T) -> &str,
) -> HashMap<&'a str, Vec<&'a T>> {
    let mut index: HashMap<&str, Vec<&T>> = HashMap::new();
    for record in records {
        index.entry(employee_id(record)).or_default().push(record);
    }
    index
}

#[allow(clippy::cast_precision_loss)]
fn summarize(
    employee_id: &str,
    employee_name: &str,
    assignments: &[&Assignment],
    check_ins: &[&CheckIn],
    now: DateTime<Utc>,
) -> EmployeeAnalytics {
    let window_start = now - Duration::days(TRAILING_WINDOW_DAYS);
    let recent = check_ins
        .iter()
        .filter(|c| c.timestamp >= window_start)
        .count();

    let total_target: u64 = assignments.iter().map(|a| u64::from(a.target)).sum();
    let target_achievement_rate = if total_target == 0 {
        0.0
    } else {
        check_ins.len() as f64 / total_target as f64 * 100.0
    };

    EmployeeAnalytics {
        employee_id: employee_id.to_string(),
        employee_name: employee_name.to_string(),
        total_assignments: assignments.len(),
        completed_assignments: assignments
            .iter()
            .filter(|a| a.status == AssignmentStatus::Completed)
            .count(),
        total_check_ins: check_ins.len(),
        average_check_ins_per_day: recent as f64 / TRAILING_WINDOW_DAYS as f64,
        last_check_in: check_ins.iter().map(|c| c.timestamp).max(),
        target_achievement_rate,
    }
}

/// Computes analytics and roundups from the repositories.
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator {
    employees: EmployeeRepository,
    assignments: AssignmentRepository,
    check_ins: CheckInRepository,
    admin_id: String,
}

impl AnalyticsAggregator {
    /// Create an aggregator over `store`, stamping roundups with `admin_id`.
    #[must_use]
    pub fn new(store: LocalStore, admin_id: impl Into<String>) -> Self {
        Self {
            employees: EmployeeRepository::new(store.clone()),
            assignments: AssignmentRepository::new(store.clone()),
            check_ins: CheckInRepository::new(store),
            admin_id: admin_id.into(),
        }
    }

    /// Analytics for one employee as of now.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn get_employee_analytics(&self, employee_id: &str) -> Result<EmployeeAnalytics> {
        self.get_employee_analytics_at(employee_id, Utc::now()).await
    }

    /// Analytics for one employee as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn get_employee_analytics_at(
        &self,
        employee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EmployeeAnalytics> {
        let name = self
            .employees
            .get_by_id(employee_id)
            .await?
            .map_or_else(|| UNKNOWN_EMPLOYEE.to_string(), |e| e.name);
        let assignments = self.assignments.get_by_employee(employee_id).await?;
        let check_ins = self
            .check_ins
            .get_by_employee(employee_id, None, None)
            .await?;

        let assignments: Vec<&Assignment> = assignments.iter().collect();
        let check_ins: Vec<&CheckIn> = check_ins.iter().collect();
        Ok(summarize(employee_id, &name, &assignments, &check_ins, now))
    }

    /// Analytics for every employee as of now.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn get_all_employees_analytics(&self) -> Result<Vec<EmployeeAnalytics>> {
        self.get_all_employees_analytics_at(Utc::now()).await
    }

    /// Analytics for every employee as of `now`, in employee collection order.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn get_all_employees_analytics_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmployeeAnalytics>> {
        let employees = self.employees.get_all().await?;
        let assignments = self.assignments.get_all().await?;
        let check_ins = self.check_ins.get_all().await?;

        let assignments_by = index_by_employee(&assignments, |a| a.employee_id.as_str());
        let check_ins_by = index_by_employee(&check_ins, |c| c.employee_id.as_str());

        let analytics = employees
            .iter()
            .map(|employee| {
                summarize(
                    &employee.id,
                    &employee.name,
                    assignments_by.get(employee.id.as_str()).map_or(&[][..], Vec::as_slice),
                    check_ins_by.get(employee.id.as_str()).map_or(&[][..], Vec::as_slice),
                    now,
                )
            })
            .collect();

        debug!(employees = employees.len(), "Computed analytics for all employees");
        Ok(analytics)
    }

    /// Roundup for `period` ending now, in the local time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn generate_activity_roundup(&self, period: RoundupPeriod) -> Result<ActivityRoundup> {
        self.generate_activity_roundup_at(period, &Local::now()).await
    }

    /// Roundup for `period` ending at `now`; the daily window follows `now`'s
    /// time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn generate_activity_roundup_at<Tz>(
        &self,
        period: RoundupPeriod,
        now: &DateTime<Tz>,
    ) -> Result<ActivityRoundup>
    where
        Tz: TimeZone,
    {
        let (window_start, window_end) = roundup_window(period, now);
        let generated_at = now.with_timezone(&Utc);

        let employees = self.employees.get_all().await?;
        let assignments = self.assignments.get_all().await?;
        let check_ins = self.check_ins.get_all().await?;

        let assignments_by = index_by_employee(&assignments, |a| a.employee_id.as_str());
        let in_window: Vec<CheckIn> = check_ins
            .into_iter()
            .filter(|c| (window_start..=window_end).contains(&c.timestamp))
            .collect();
        let check_ins_by = index_by_employee(&in_window, |c| c.employee_id.as_str());

        let activities: Vec<EmployeeActivity> = employees
            .iter()
            .map(|employee| activity_for(employee, &assignments_by, &check_ins_by))
            .collect();

        let roundup = ActivityRoundup {
            id: Uuid::new_v4(),
            admin_id: self.admin_id.clone(),
            period,
            window_start,
            window_end,
            generated_at,
            total_check_ins: activities.iter().map(|a| a.check_ins).sum(),
            active_employees: activities.iter().filter(|a| a.check_ins > 0).count(),
            employees: activities,
        };

        info!(
            id = %roundup.id,
            %period,
            check_ins = roundup.total_check_ins,
            "Generated activity roundup"
        );
        Ok(roundup)
    }
}

fn activity_for(
    employee: &Employee,
    assignments_by: &HashMap<&str, Vec<&Assignment>>,
    check_ins_by: &HashMap<&str, Vec<&CheckIn>>,
) -> EmployeeActivity {
    let check_ins = check_ins_by
        .get(employee.id.as_str())
        .map_or(&[][..], Vec::as_slice);

    let mut seen = HashSet::new();
    let doctors_visited = check_ins
        .iter()
        .filter(|c| seen.insert(c.doctor_id.as_str()))
        .map(|c| c.doctor_id.clone())
        .collect();

    EmployeeActivity {
        employee_id: employee.id.clone(),
        employee_name: employee.name.clone(),
        check_ins: check_ins.len(),
        targets_achieved: assignments_by
            .get(employee.id.as_str())
            .map_or(0, |assignments| {
                assignments.iter().filter(|a| a.is_target_met()).count()
            }),
        doctors_visited,
    }
}
