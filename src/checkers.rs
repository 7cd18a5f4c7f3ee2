//! Constraint checks over a finished allocation.
//!
//! Each checker is stateless and reads its inputs only, so the same
//! allocation can be checked any number of times, in any order, from any
//! thread. Violations come back as failing reports, never as errors.

use crate::data::{
    Allocation, Catalog, CapacityOverrun, CheckKind, Configuration, OfferingName, Period,
    PeriodConflict, ReportDetail, UnknownEntry, ValidationReport,
};
use itertools::Itertools;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// A single constraint check.
pub trait Validator: Send + Sync {
    fn kind(&self) -> CheckKind;

    fn check(&self, allocation: &Allocation, catalog: &Catalog) -> ValidationReport;

    /// Checks a raw JSON allocation. A document that does not parse yields a
    /// failing report carrying the parse error.
    fn check_document(&self, document: &str, catalog: &Catalog) -> ValidationReport {
        match Allocation::from_json(document) {
            Ok(allocation) => self.check(&allocation, catalog),
            Err(e) => {
                debug!("{} check given malformed allocation: {e}", self.kind());
                ValidationReport::malformed(self.kind(), &e)
            }
        }
    }
}

/// Every student holds exactly `classes_per_student` classes.
#[derive(Debug, Clone, Copy)]
pub struct TotalCountChecker {
    pub classes_per_student: usize,
}

impl Validator for TotalCountChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::TotalCount
    }

    fn check(&self, allocation: &Allocation, _catalog: &Catalog) -> ValidationReport {
        let invalid = allocation
            .students()
            .filter(|(student, _)| allocation.class_count(student) != self.classes_per_student)
            .map(|(student, _)| student.clone())
            .collect();
        ValidationReport::from_detail(self.kind(), ReportDetail::InvalidStudents(invalid))
    }
}

/// No student takes the same class twice, on any combination of days.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessChecker;

impl Validator for UniquenessChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Uniqueness
    }

    fn check(&self, allocation: &Allocation, _catalog: &Catalog) -> ValidationReport {
        let invalid = allocation
            .students()
            .filter(|(_, days)| {
                let names = days.values().flatten().map(|e| e.name.as_str());
                names.clone().count() != names.unique().count()
            })
            .map(|(student, _)| student.clone())
            .collect();
        ValidationReport::from_detail(self.kind(), ReportDetail::InvalidStudents(invalid))
    }
}

/// No (day, class) pair holds more students than its declared capacity.
///
/// Classes missing from the catalog are left to [`MembershipChecker`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityChecker;

impl Validator for CapacityChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Capacity
    }

    fn check(&self, allocation: &Allocation, catalog: &Catalog) -> ValidationReport {
        let counts: BTreeMap<(&str, &str), usize> = allocation
            .entries()
            .map(|(_, day, entry)| (day.as_str(), entry.name.as_str()))
            .counts()
            .into_iter()
            .collect();

        let exceeded = counts
            .into_iter()
            .filter_map(|((day, class), assigned)| {
                let offering = catalog.offering(day, class)?;
                (assigned > offering.capacity as usize).then(|| CapacityOverrun {
                    day: day.to_string(),
                    class: class.to_string(),
                    assigned,
                    capacity: offering.capacity,
                })
            })
            .collect();
        ValidationReport::from_detail(self.kind(), ReportDetail::ExceededClasses(exceeded))
    }
}

/// Each catalog day offers exactly `expected` distinct classes.
#[derive(Debug, Clone, Copy)]
pub struct OfferingsPerDayChecker {
    pub expected: usize,
}

impl Validator for OfferingsPerDayChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::OfferingsPerDay
    }

    fn check(&self, _allocation: &Allocation, catalog: &Catalog) -> ValidationReport {
        let invalid = catalog
            .days()
            .filter(|(_, offerings)| offerings.len() != self.expected)
            .map(|(day, _)| day.clone())
            .collect();
        ValidationReport::from_detail(self.kind(), ReportDetail::InvalidDays(invalid))
    }
}

/// Every assigned class is offered by the catalog on the day it was assigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipChecker;

impl Validator for MembershipChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::Membership
    }

    fn check(&self, allocation: &Allocation, catalog: &Catalog) -> ValidationReport {
        let invalid = allocation
            .entries()
            .filter(|(_, day, entry)| catalog.offering(day, &entry.name).is_none())
            .map(|(student, day, entry)| UnknownEntry {
                student: student.clone(),
                day: day.clone(),
                class: entry.name.clone(),
            })
            .collect();
        ValidationReport::from_detail(self.kind(), ReportDetail::InvalidEntries(invalid))
    }
}

/// No student holds two classes in the same period of one day.
///
/// An entry without a period cannot be placed and is reported as missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodConflictChecker;

impl Validator for PeriodConflictChecker {
    fn kind(&self) -> CheckKind {
        CheckKind::PeriodConflict
    }

    fn check(&self, allocation: &Allocation, _catalog: &Catalog) -> ValidationReport {
        let mut conflicts = Vec::new();
        let mut missing_periods = Vec::new();

        for (student, days) in allocation.students() {
            for (day, entries) in days {
                let mut held: HashMap<Period, &OfferingName> = HashMap::new();
                for entry in entries {
                    let Some(period) = entry.period else {
                        missing_periods.push(UnknownEntry {
                            student: student.clone(),
                            day: day.clone(),
                            class: entry.name.clone(),
                        });
                        continue;
                    };
                    match held.get(&period) {
                        Some(first) => conflicts.push(PeriodConflict {
                            student: student.clone(),
                            day: day.clone(),
                            period,
                            classes: [(*first).clone(), entry.name.clone()],
                        }),
                        None => {
                            held.insert(period, &entry.name);
                        }
                    }
                }
            }
        }

        ValidationReport::from_detail(
            self.kind(),
            ReportDetail::Conflicts {
                conflicts,
                missing_periods,
            },
        )
    }
}

/// The full check set for a configuration.
pub fn standard_checks(config: &Configuration) -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(TotalCountChecker {
            classes_per_student: config.classes_per_student,
        }),
        Box::new(UniquenessChecker),
        Box::new(CapacityChecker),
        Box::new(OfferingsPerDayChecker {
            expected: config.offerings_per_day,
        }),
        Box::new(MembershipChecker),
        Box::new(PeriodConflictChecker),
    ]
}

/// Runs every standard check against a typed allocation.
pub fn run_all(
    config: &Configuration,
    allocation: &Allocation,
    catalog: &Catalog,
) -> Vec<ValidationReport> {
    standard_checks(config)
        .iter()
        .map(|check| check.check(allocation, catalog))
        .collect()
}

/// Runs every standard check against a raw JSON allocation.
pub fn run_all_on_document(
    config: &Configuration,
    document: &str,
    catalog: &Catalog,
) -> Vec<ValidationReport> {
    match Allocation::from_json(document) {
        Ok(allocation) => run_all(config, &allocation, catalog),
        Err(e) => standard_checks(config)
            .iter()
            .map(|check| ValidationReport::malformed(check.kind(), &e))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ClassEntry;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_offering("Day1", "Math", 1, &[1, 3])
            .with_offering("Day1", "Art", 5, &[2])
            .with_offering("Day2", "Music", 5, &[1, 2])
            .with_offering("Day2", "PE", 5, &[1, 4])
    }

    fn allocation(json: &str) -> Allocation {
        Allocation::from_json(json).unwrap()
    }

    #[test]
    fn total_count_flags_wrong_totals() {
        let a = allocation(
            r#"{
                "Student1": {"Day1": [{"class": "Math", "period": 1}], "Day2": [{"class": "PE", "period": 1}]},
                "Student2": {"Day1": [{"class": "Art", "period": 2}], "Day2": []}
            }"#,
        );
        let report = TotalCountChecker {
            classes_per_student: 2,
        }
        .check(&a, &catalog());
        assert!(!report.valid);
        assert_eq!(
            report.detail,
            ReportDetail::InvalidStudents(vec!["Student2".into()])
        );
    }

    #[test]
    fn uniqueness_spans_days() {
        let mut a = Allocation::new();
        a.push("Student1", "Day1", ClassEntry::new("Music", 1));
        a.push("Student1", "Day2", ClassEntry::new("Music", 2));
        a.push("Student2", "Day2", ClassEntry::new("Music", 2));
        let report = UniquenessChecker.check(&a, &catalog());
        assert_eq!(
            report.detail,
            ReportDetail::InvalidStudents(vec!["Student1".into()])
        );
    }

    #[test]
    fn capacity_reports_overrun_tuple() {
        let mut a = Allocation::new();
        a.push("Student1", "Day1", ClassEntry::new("Math", 1));
        a.push("Student2", "Day1", ClassEntry::new("Math", 3));
        a.push("Student2", "Day1", ClassEntry::new("Ghost", 2));
        let report = CapacityChecker.check(&a, &catalog());
        assert!(!report.valid);
        assert_eq!(
            report.detail,
            ReportDetail::ExceededClasses(vec![CapacityOverrun {
                day: "Day1".into(),
                class: "Math".into(),
                assigned: 2,
                capacity: 1,
            }])
        );
    }

    #[test]
    fn offerings_per_day_counts_catalog_only() {
        let report = OfferingsPerDayChecker { expected: 2 }.check(&Allocation::new(), &catalog());
        assert!(report.valid);
        let lopsided = catalog().with_offering("Day2", "Biology", 3, &[5]);
        let report = OfferingsPerDayChecker { expected: 2 }.check(&Allocation::new(), &lopsided);
        assert_eq!(report.detail, ReportDetail::InvalidDays(vec!["Day2".into()]));
    }

    #[test]
    fn membership_is_per_day() {
        let mut a = Allocation::new();
        // Music is offered on Day2 only.
        a.push("Student1", "Day1", ClassEntry::new("Music", 1));
        a.push("Student1", "Day2", ClassEntry::new("Music", 1));
        let report = MembershipChecker.check(&a, &catalog());
        assert_eq!(
            report.detail,
            ReportDetail::InvalidEntries(vec![UnknownEntry {
                student: "Student1".into(),
                day: "Day1".into(),
                class: "Music".into(),
            }])
        );
    }

    #[test]
    fn period_conflict_names_both_classes() {
        let mut a = Allocation::new();
        a.push("Student1", "Day2", ClassEntry::new("Music", 1));
        a.push("Student1", "Day2", ClassEntry::new("PE", 1));
        a.push("Student1", "Day1", ClassEntry::new("Math", 1));
        let report = PeriodConflictChecker.check(&a, &catalog());
        let ReportDetail::Conflicts { conflicts, missing_periods } = report.detail else {
            panic!("wrong detail kind");
        };
        assert!(missing_periods.is_empty());
        assert_eq!(
            conflicts,
            vec![PeriodConflict {
                student: "Student1".into(),
                day: "Day2".into(),
                period: 1,
                classes: ["Music".into(), "PE".into()],
            }]
        );
    }

    #[test]
    fn missing_period_fails_conflict_check() {
        let a = allocation(
            r#"{"Student1": {"Day1": [{"class": "Math"}, {"class": "Art"}]}}"#,
        );
        let report = PeriodConflictChecker.check(&a, &catalog());
        assert!(!report.valid);
        let ReportDetail::Conflicts { conflicts, missing_periods } = report.detail else {
            panic!("wrong detail kind");
        };
        assert!(conflicts.is_empty());
        assert_eq!(missing_periods.len(), 2);
    }

    #[test]
    fn malformed_document_becomes_failing_report() {
        let report = UniquenessChecker.check_document("{\"Student1\": [oops", &catalog());
        assert!(!report.valid);
        assert!(report.error.is_some());

        let reports = run_all_on_document(&Configuration::default(), "not json", &catalog());
        assert_eq!(reports.len(), 6);
        assert!(reports.iter().all(|r| !r.valid && r.error.is_some()));
    }

    #[test]
    fn checks_are_idempotent() {
        let mut a = Allocation::new();
        a.push("Student1", "Day1", ClassEntry::new("Math", 1));
        a.push("Student1", "Day1", ClassEntry::new("Math", 1));
        let config = Configuration::default();
        assert_eq!(run_all(&config, &a, &catalog()), run_all(&config, &a, &catalog()));
    }
}
