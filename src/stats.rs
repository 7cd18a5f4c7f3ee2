//! Summary statistics over one run: how full the students are, how much of
//! the catalog was used, how classes spread over days and periods, and how
//! many checks passed.

use crate::data::{Allocation, Catalog, CheckKind, Configuration, DayId, Period, ValidationReport};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingStats {
    pub total_students: usize,
    pub total_classes_assigned: usize,
    pub avg_classes_per_student: f64,
    pub min_classes_per_student: usize,
    pub max_classes_per_student: usize,
    pub target_classes_per_student: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityStats {
    pub total_capacity: u64,
    pub used_capacity: u64,
    pub overall_utilization: f64,
    pub avg_class_utilization: f64,
    pub min_class_utilization: f64,
    pub max_class_utilization: f64,
    pub classes_at_capacity: usize,
    pub underutilized_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionStats {
    pub classes_per_day: BTreeMap<DayId, usize>,
    pub classes_per_period: BTreeMap<Period, usize>,
    pub most_popular_period: Option<Period>,
    pub least_popular_period: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationStats {
    pub total_validation_checks: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub success_rate: f64,
    pub failed_checks: Vec<CheckKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatistics {
    pub scheduling: SchedulingStats,
    pub capacity: CapacityStats,
    pub distribution: DistributionStats,
    pub validation: ValidationStats,
}

pub fn collect(
    config: &Configuration,
    allocation: &Allocation,
    catalog: &Catalog,
    reports: &[ValidationReport],
) -> ScheduleStatistics {
    ScheduleStatistics {
        scheduling: scheduling_stats(config, allocation),
        capacity: capacity_stats(allocation, catalog),
        distribution: distribution_stats(allocation),
        validation: validation_stats(reports),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

fn scheduling_stats(config: &Configuration, allocation: &Allocation) -> SchedulingStats {
    let per_student: Vec<usize> = allocation
        .students()
        .map(|(student, _)| allocation.class_count(student))
        .collect();
    let total = allocation.total_classes();
    let (min, max) = per_student
        .iter()
        .copied()
        .minmax()
        .into_option()
        .unwrap_or((0, 0));
    SchedulingStats {
        total_students: per_student.len(),
        total_classes_assigned: total,
        avg_classes_per_student: round2(if per_student.is_empty() {
            0.0
        } else {
            total as f64 / per_student.len() as f64
        }),
        min_classes_per_student: min,
        max_classes_per_student: max,
        target_classes_per_student: config.classes_per_student,
    }
}

fn capacity_stats(allocation: &Allocation, catalog: &Catalog) -> CapacityStats {
    let enrolled = allocation
        .entries()
        .map(|(_, day, entry)| (day.as_str(), entry.name.as_str()))
        .counts();

    let mut total_capacity = 0u64;
    let mut used_capacity = 0u64;
    let mut utilizations = Vec::new();
    for (day, offerings) in catalog.days() {
        for (name, offering) in offerings {
            let taken = enrolled.get(&(day.as_str(), name.as_str())).copied().unwrap_or(0);
            total_capacity += u64::from(offering.capacity);
            used_capacity += taken as u64;
            if offering.capacity > 0 {
                utilizations.push(percent(taken as f64, offering.capacity as f64));
            }
        }
    }

    let (min, max) = utilizations
        .iter()
        .copied()
        .minmax_by(|a, b| a.total_cmp(b))
        .into_option()
        .unwrap_or((0.0, 0.0));
    let avg = if utilizations.is_empty() {
        0.0
    } else {
        utilizations.iter().sum::<f64>() / utilizations.len() as f64
    };

    CapacityStats {
        total_capacity,
        used_capacity,
        overall_utilization: round2(percent(used_capacity as f64, total_capacity as f64)),
        avg_class_utilization: round2(avg),
        min_class_utilization: round2(min),
        max_class_utilization: round2(max),
        classes_at_capacity: utilizations.iter().filter(|&&u| u >= 100.0).count(),
        underutilized_classes: utilizations.iter().filter(|&&u| u < 50.0).count(),
    }
}

fn distribution_stats(allocation: &Allocation) -> DistributionStats {
    let mut classes_per_day: BTreeMap<DayId, usize> = BTreeMap::new();
    let mut classes_per_period: BTreeMap<Period, usize> = BTreeMap::new();
    for (_, day, entry) in allocation.entries() {
        *classes_per_day.entry(day.clone()).or_default() += 1;
        if let Some(period) = entry.period {
            *classes_per_period.entry(period).or_default() += 1;
        }
    }

    // Ties go to the lowest period number.
    let most_popular_period = classes_per_period
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(&period, _)| period);
    let least_popular_period = classes_per_period
        .iter()
        .min_by_key(|&(_, &count)| count)
        .map(|(&period, _)| period);

    DistributionStats {
        classes_per_day,
        classes_per_period,
        most_popular_period,
        least_popular_period,
    }
}

fn validation_stats(reports: &[ValidationReport]) -> ValidationStats {
    let (passed, failed): (Vec<_>, Vec<_>) = reports.iter().partition(|r| r.valid);
    ValidationStats {
        total_validation_checks: reports.len(),
        checks_passed: passed.len(),
        checks_failed: failed.len(),
        success_rate: round2(percent(passed.len() as f64, reports.len() as f64)),
        failed_checks: failed.iter().map(|r| r.check).collect(),
    }
}
