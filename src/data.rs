use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SchedulerError};

// Type aliases for clarity
pub type StudentId = String;
pub type DayId = String;
pub type OfferingName = String;
pub type Period = u32;

/// A class offered on one day: how many seats it has and which periods it may run in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Offering {
    pub capacity: u32,
    pub periods: Vec<Period>,
}

impl Offering {
    pub fn new(capacity: u32, periods: impl IntoIterator<Item = Period>) -> Self {
        let mut periods: Vec<Period> = periods.into_iter().collect();
        periods.sort_unstable();
        periods.dedup();
        Self { capacity, periods }
    }

    /// An offering with no seats or no periods is kept in the catalog but never assigned.
    pub fn is_assignable(&self) -> bool {
        self.capacity > 0 && !self.periods.is_empty()
    }
}

/// Offerings per day, keyed by day and then by offering name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    days: BTreeMap<DayId, BTreeMap<OfferingName, Offering>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text.trim())?)
    }

    /// Builder used by providers and tests; no validation is applied.
    pub fn with_offering(mut self, day: &str, name: &str, capacity: u32, periods: &[Period]) -> Self {
        self.days
            .entry(day.to_string())
            .or_default()
            .insert(name.to_string(), Offering::new(capacity, periods.iter().copied()));
        self
    }

    pub fn day(&self, day: &str) -> Option<&BTreeMap<OfferingName, Offering>> {
        self.days.get(day)
    }

    pub fn offering(&self, day: &str, name: &str) -> Option<&Offering> {
        self.days.get(day).and_then(|offerings| offerings.get(name))
    }

    pub fn days(&self) -> impl Iterator<Item = (&DayId, &BTreeMap<OfferingName, Offering>)> {
        self.days.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Adds or replaces an offering, enforcing positive capacity and at least one period.
    pub fn upsert_offering(
        &mut self,
        day: &str,
        name: &str,
        capacity: u32,
        periods: &[Period],
    ) -> Result<()> {
        let invalid = |reason: &str| SchedulerError::InvalidOffering {
            day: day.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if day.trim().is_empty() || name.trim().is_empty() {
            return Err(invalid("day and class name are required"));
        }
        if capacity < 1 {
            return Err(invalid("capacity must be at least 1"));
        }
        if periods.is_empty() {
            return Err(invalid("at least one period is required"));
        }
        if periods.contains(&0) {
            return Err(invalid("periods are numbered from 1"));
        }
        self.days
            .entry(day.to_string())
            .or_default()
            .insert(name.to_string(), Offering::new(capacity, periods.iter().copied()));
        Ok(())
    }

    /// Removes an offering; a day left without offerings is dropped as well.
    pub fn remove_offering(&mut self, day: &str, name: &str) -> bool {
        let Some(offerings) = self.days.get_mut(day) else {
            return false;
        };
        let removed = offerings.remove(name).is_some();
        if offerings.is_empty() {
            self.days.remove(day);
        }
        removed
    }
}

/// Run parameters. JSON keys follow the persisted system config document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(rename = "num_students")]
    pub student_count: usize,
    pub classes_per_student: usize,
    #[serde(rename = "num_days")]
    pub day_count: usize,
    pub periods_per_day: u32,
    pub min_classes_per_day: usize,
    #[serde(default = "default_offerings_per_day")]
    pub offerings_per_day: usize,
}

fn default_offerings_per_day() -> usize {
    6
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            student_count: 10,
            classes_per_student: 5,
            day_count: 2,
            periods_per_day: 6,
            min_classes_per_day: 1,
            offerings_per_day: default_offerings_per_day(),
        }
    }
}

impl Configuration {
    pub const MAX_STUDENTS: usize = 10_000;
    pub const MAX_DAYS: usize = 31;
    pub const MAX_CLASSES_PER_STUDENT: usize = 100;
    pub const MAX_PERIODS_PER_DAY: u32 = 24;

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("num_students", self.student_count),
            ("classes_per_student", self.classes_per_student),
            ("num_days", self.day_count),
            ("periods_per_day", self.periods_per_day as usize),
            ("min_classes_per_day", self.min_classes_per_day),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "{name} must be a positive integer"
            )));
        }
        let limits = [
            ("num_students", self.student_count, Self::MAX_STUDENTS),
            ("num_days", self.day_count, Self::MAX_DAYS),
            ("classes_per_student", self.classes_per_student, Self::MAX_CLASSES_PER_STUDENT),
            (
                "periods_per_day",
                self.periods_per_day as usize,
                Self::MAX_PERIODS_PER_DAY as usize,
            ),
        ];
        if let Some((name, value, max)) = limits.iter().find(|(_, value, max)| value > max) {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "{name} ({value}) exceeds the limit of {max}"
            )));
        }
        let floor = self
            .min_classes_per_day
            .checked_mul(self.day_count)
            .ok_or_else(|| {
                SchedulerError::InvalidConfiguration(
                    "min_classes_per_day * num_days overflows".to_string(),
                )
            })?;
        if self.classes_per_student < floor {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "classes_per_student ({}) is below min_classes_per_day * num_days ({floor})",
                self.classes_per_student
            )));
        }
        Ok(())
    }

    /// Day identifiers `Day1..DayN` in schedule order.
    pub fn day_ids(&self) -> Vec<DayId> {
        (1..=self.day_count).map(|i| format!("Day{i}")).collect()
    }

    /// Student identifiers `Student1..StudentM`.
    pub fn student_ids(&self) -> Vec<StudentId> {
        (1..=self.student_count).map(|i| format!("Student{i}")).collect()
    }
}

/// One assigned class. A missing period is kept so the conflict checker can flag it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassEntry {
    #[serde(rename = "class")]
    pub name: OfferingName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl ClassEntry {
    pub fn new(name: impl Into<OfferingName>, period: Period) -> Self {
        Self {
            name: name.into(),
            period: Some(period),
        }
    }
}

impl fmt::Display for ClassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Some(period) => write!(f, "{} (P{})", self.name, period),
            None => write!(f, "{}", self.name),
        }
    }
}

pub type DaySchedule = BTreeMap<DayId, Vec<ClassEntry>>;

/// Student → day → assigned classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Allocation {
    students: BTreeMap<StudentId, DaySchedule>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text.trim())?)
    }

    /// Registers a student with an empty list for each given day.
    pub fn add_student(&mut self, student: &str, days: &[DayId]) {
        let schedule = self.students.entry(student.to_string()).or_default();
        for day in days {
            schedule.entry(day.clone()).or_default();
        }
    }

    pub fn push(&mut self, student: &str, day: &str, entry: ClassEntry) {
        self.students
            .entry(student.to_string())
            .or_default()
            .entry(day.to_string())
            .or_default()
            .push(entry);
    }

    pub fn students(&self) -> impl Iterator<Item = (&StudentId, &DaySchedule)> {
        self.students.iter()
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    /// Entries assigned to one student across all days.
    pub fn class_count(&self, student: &str) -> usize {
        self.students
            .get(student)
            .map(|days| days.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn total_classes(&self) -> usize {
        self.students
            .values()
            .flat_map(|days| days.values())
            .map(Vec::len)
            .sum()
    }

    /// Every (student, day, entry) triple.
    pub fn entries(&self) -> impl Iterator<Item = (&StudentId, &DayId, &ClassEntry)> {
        self.students.iter().flat_map(|(student, days)| {
            days.iter()
                .flat_map(move |(day, entries)| entries.iter().map(move |e| (student, day, e)))
        })
    }
}

/// Which constraint a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    TotalCount,
    Uniqueness,
    Capacity,
    OfferingsPerDay,
    Membership,
    PeriodConflict,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::TotalCount => "total-count",
            CheckKind::Uniqueness => "uniqueness",
            CheckKind::Capacity => "capacity",
            CheckKind::OfferingsPerDay => "offerings-per-day",
            CheckKind::Membership => "membership",
            CheckKind::PeriodConflict => "period-conflict",
        };
        f.write_str(name)
    }
}

/// A (day, offering) pair assigned beyond its declared capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CapacityOverrun {
    pub day: DayId,
    pub class: OfferingName,
    pub assigned: usize,
    pub capacity: u32,
}

/// An assigned class that the catalog does not offer on that day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnknownEntry {
    pub student: StudentId,
    pub day: DayId,
    pub class: OfferingName,
}

/// Two classes held by one student in the same period of the same day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeriodConflict {
    pub student: StudentId,
    pub day: DayId,
    pub period: Period,
    pub classes: [OfferingName; 2],
}

/// Kind-specific diagnostics carried by a report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDetail {
    InvalidStudents(Vec<StudentId>),
    ExceededClasses(Vec<CapacityOverrun>),
    InvalidDays(Vec<DayId>),
    InvalidEntries(Vec<UnknownEntry>),
    Conflicts {
        conflicts: Vec<PeriodConflict>,
        missing_periods: Vec<UnknownEntry>,
    },
}

impl ReportDetail {
    /// The detail a check reports when it found nothing.
    pub fn empty_for(kind: CheckKind) -> Self {
        match kind {
            CheckKind::TotalCount | CheckKind::Uniqueness => ReportDetail::InvalidStudents(Vec::new()),
            CheckKind::Capacity => ReportDetail::ExceededClasses(Vec::new()),
            CheckKind::OfferingsPerDay => ReportDetail::InvalidDays(Vec::new()),
            CheckKind::Membership => ReportDetail::InvalidEntries(Vec::new()),
            CheckKind::PeriodConflict => ReportDetail::Conflicts {
                conflicts: Vec::new(),
                missing_periods: Vec::new(),
            },
        }
    }

    pub fn issue_count(&self) -> usize {
        match self {
            ReportDetail::InvalidStudents(v) => v.len(),
            ReportDetail::ExceededClasses(v) => v.len(),
            ReportDetail::InvalidDays(v) => v.len(),
            ReportDetail::InvalidEntries(v) => v.len(),
            ReportDetail::Conflicts {
                conflicts,
                missing_periods,
            } => conflicts.len() + missing_periods.len(),
        }
    }
}

/// Outcome of one checker over one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationReport {
    pub check: CheckKind,
    pub valid: bool,
    pub detail: ReportDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    pub fn from_detail(check: CheckKind, detail: ReportDetail) -> Self {
        Self {
            check,
            valid: detail.issue_count() == 0,
            detail,
            error: None,
        }
    }

    /// Report for a payload that could not be parsed into an allocation.
    pub fn malformed(check: CheckKind, error: &SchedulerError) -> Self {
        Self {
            check,
            valid: false,
            detail: ReportDetail::empty_for(check),
            error: Some(error.to_string()),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.valid { "pass" } else { "fail" };
        match &self.error {
            Some(err) => write!(f, "[{}] {}: {}", self.check, status, err),
            None => write!(
                f,
                "[{}] {} ({} issue(s))",
                self.check,
                status,
                self.detail.issue_count()
            ),
        }
    }
}

/// Completeness score of a rendered allocation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClarityReport {
    pub valid: bool,
    pub clarity_score: f64,
    pub summary: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub student_count: usize,
    pub total_classes: usize,
    pub formatted_output_length: usize,
}
