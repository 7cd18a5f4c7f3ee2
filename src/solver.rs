use crate::data::{
    Allocation, Catalog, ClassEntry, Configuration, DayId, Offering, OfferingName, Period,
};
use crate::error::{Result, SchedulerError};
use log::{debug, info, trace};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

/// Remaining seats per (day, offering) for a single allocation pass.
///
/// Counts only ever go down, and never below zero.
#[derive(Debug, Clone)]
pub struct CapacityTracker {
    remaining: HashMap<DayId, HashMap<OfferingName, u32>>,
}

impl CapacityTracker {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let remaining = catalog
            .days()
            .map(|(day, offerings)| {
                let seats = offerings
                    .iter()
                    .map(|(name, offering)| (name.clone(), offering.capacity))
                    .collect();
                (day.clone(), seats)
            })
            .collect();
        Self { remaining }
    }

    /// Seats left; unknown pairs have none.
    pub fn remaining(&self, day: &str, name: &str) -> u32 {
        self.remaining
            .get(day)
            .and_then(|seats| seats.get(name))
            .copied()
            .unwrap_or(0)
    }

    /// Takes one seat. Returns false, leaving the count untouched, when none is left.
    pub fn reserve(&mut self, day: &str, name: &str) -> bool {
        match self.remaining.get_mut(day).and_then(|seats| seats.get_mut(name)) {
            Some(seats) if *seats > 0 => {
                *seats -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Allowed periods of `offering` not already held by the student that day.
pub fn free_periods(offering: &Offering, occupied: &BTreeSet<Period>) -> Vec<Period> {
    offering
        .periods
        .iter()
        .copied()
        .filter(|period| !occupied.contains(period))
        .collect()
}

/// How many classes each day should receive for one student.
///
/// Every day gets the configured minimum; each spare class then goes to a
/// uniformly random day, so totals per day are not balanced.
pub fn day_targets<R: Rng + ?Sized>(config: &Configuration, rng: &mut R) -> Vec<usize> {
    let mut targets = vec![config.min_classes_per_day; config.day_count];
    let spare = config
        .classes_per_student
        .saturating_sub(config.min_classes_per_day.saturating_mul(config.day_count));
    for _ in 0..spare {
        let day = rng.random_range(0..config.day_count);
        targets[day] += 1;
    }
    targets
}

#[derive(Debug, Default)]
struct StudentState {
    used: HashSet<OfferingName>,
    occupied: HashMap<DayId, BTreeSet<Period>>,
    assigned: usize,
}

type DayOfferings<'a> = Vec<(&'a DayId, &'a BTreeMap<OfferingName, Offering>)>;

/// Builds one allocation with the randomized greedy assigner.
///
/// Capacity or period exhaustion never fails the run; affected students are
/// left short of their target. Reproducible when `rng` is seeded.
pub fn generate<R: Rng + ?Sized>(
    catalog: &Catalog,
    config: &Configuration,
    rng: &mut R,
) -> Result<Allocation> {
    allocate(catalog, config, rng).map(|(allocation, _)| allocation)
}

fn allocate<R: Rng + ?Sized>(
    catalog: &Catalog,
    config: &Configuration,
    rng: &mut R,
) -> Result<(Allocation, CapacityTracker)> {
    let start_time = Instant::now();
    config.validate()?;

    let days = config.day_ids();
    let day_offerings: DayOfferings = days
        .iter()
        .map(|day| {
            catalog
                .day(day)
                .map(|offerings| (day, offerings))
                .ok_or_else(|| SchedulerError::MalformedCatalog(day.clone()))
        })
        .collect::<Result<_>>()?;

    info!(
        "Allocating {} classes to each of {} students over {} days...",
        config.classes_per_student, config.student_count, config.day_count
    );

    let mut capacity = CapacityTracker::from_catalog(catalog);
    let mut allocation = Allocation::new();
    let mut short_students = 0;

    for student in config.student_ids() {
        let assigned = assign_student(
            &student,
            config,
            &days,
            &day_offerings,
            &mut capacity,
            &mut allocation,
            rng,
        );
        if assigned < config.classes_per_student {
            short_students += 1;
            debug!(
                "{student} left with {assigned} of {} classes",
                config.classes_per_student
            );
        }
    }

    info!(
        "Allocation built in {:.2?}: {} classes assigned, {} student(s) under target",
        start_time.elapsed(),
        allocation.total_classes(),
        short_students
    );
    Ok((allocation, capacity))
}

/// Runs the per-day pass and then the fallback sweep for one student.
/// Returns how many classes the student received.
fn assign_student<R: Rng + ?Sized>(
    student: &str,
    config: &Configuration,
    days: &[DayId],
    day_offerings: &DayOfferings,
    capacity: &mut CapacityTracker,
    allocation: &mut Allocation,
    rng: &mut R,
) -> usize {
    allocation.add_student(student, days);
    let mut state = StudentState::default();
    let targets = day_targets(config, rng);
    trace!("{student}: day targets {targets:?}");

    for (&(day, offerings), &target) in day_offerings.iter().zip(&targets) {
        let mut names: Vec<&OfferingName> = offerings.keys().collect();
        names.shuffle(rng);

        let mut placed = 0;
        for name in names {
            if placed >= target {
                break;
            }
            if let Some(entry) = try_assign(day, name, &offerings[name], &mut state, capacity, rng)
            {
                allocation.push(student, day, entry);
                placed += 1;
            }
        }
        if placed < target {
            debug!("{student}: placed {placed} of {target} on {day}");
        }
    }

    if state.assigned < config.classes_per_student {
        fill_shortfall(
            student,
            day_offerings,
            config.classes_per_student,
            &mut state,
            capacity,
            allocation,
            rng,
        );
    }
    state.assigned
}

/// Places `name` for the student if it is unused, has a seat and a free period.
fn try_assign<R: Rng + ?Sized>(
    day: &str,
    name: &str,
    offering: &Offering,
    state: &mut StudentState,
    capacity: &mut CapacityTracker,
    rng: &mut R,
) -> Option<ClassEntry> {
    if !offering.is_assignable()
        || state.used.contains(name)
        || capacity.remaining(day, name) == 0
    {
        return None;
    }
    let occupied = state.occupied.entry(day.to_string()).or_default();
    let period = *free_periods(offering, occupied).choose(rng)?;
    if !capacity.reserve(day, name) {
        return None;
    }
    occupied.insert(period);
    state.used.insert(name.to_string());
    state.assigned += 1;
    trace!("assigned {name} on {day} in period {period}");
    Some(ClassEntry::new(name, period))
}

/// Sweeps every (day, offering) pair in day order until the student reaches
/// `target` or a whole sweep places nothing.
fn fill_shortfall<R: Rng + ?Sized>(
    student: &str,
    day_offerings: &DayOfferings,
    target: usize,
    state: &mut StudentState,
    capacity: &mut CapacityTracker,
    allocation: &mut Allocation,
    rng: &mut R,
) {
    loop {
        let mut progressed = false;
        for &(day, offerings) in day_offerings {
            for (name, offering) in offerings {
                if state.assigned >= target {
                    return;
                }
                if let Some(entry) = try_assign(day, name, offering, state, capacity, rng) {
                    allocation.push(student, day, entry);
                    progressed = true;
                }
            }
        }
        if !progressed || state.assigned >= target {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn roomy_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        for day in ["Day1", "Day2"] {
            for (i, name) in ["Math", "Science", "History", "Art", "Music", "PE"]
                .iter()
                .enumerate()
            {
                let period = i as u32 + 1;
                catalog = catalog.with_offering(day, name, 10, &[period]);
            }
        }
        catalog
    }

    /// Fails the test if the engine draws any randomness.
    struct PanickingRng;

    impl rand::RngCore for PanickingRng {
        fn next_u32(&mut self) -> u32 {
            panic!("no random draw expected")
        }
        fn next_u64(&mut self) -> u64 {
            panic!("no random draw expected")
        }
        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            panic!("no random draw expected")
        }
    }

    #[test]
    fn tracker_never_goes_below_zero() {
        let catalog = Catalog::new().with_offering("Day1", "Art", 2, &[1]);
        let mut tracker = CapacityTracker::from_catalog(&catalog);
        assert!(tracker.reserve("Day1", "Art"));
        assert!(tracker.reserve("Day1", "Art"));
        assert!(!tracker.reserve("Day1", "Art"));
        assert_eq!(tracker.remaining("Day1", "Art"), 0);
        assert!(!tracker.reserve("Day1", "Nope"));
        assert_eq!(tracker.remaining("Day3", "Art"), 0);
    }

    #[test]
    fn free_periods_skip_occupied() {
        let offering = Offering::new(3, [1, 3, 5]);
        let occupied: BTreeSet<Period> = [3, 4].into_iter().collect();
        assert_eq!(free_periods(&offering, &occupied), vec![1, 5]);
    }

    #[test]
    fn exact_floor_needs_no_random_draws() {
        let config = Configuration {
            classes_per_student: 6,
            day_count: 3,
            min_classes_per_day: 2,
            ..Configuration::default()
        };
        assert_eq!(day_targets(&config, &mut PanickingRng), vec![2, 2, 2]);
    }

    #[test]
    fn targets_sum_to_class_count() {
        let config = Configuration::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let targets = day_targets(&config, &mut rng);
            assert_eq!(targets.iter().sum::<usize>(), 5);
            assert!(targets.iter().all(|&t| t >= 1));
        }
    }

    #[test]
    fn missing_day_is_malformed_catalog() {
        let catalog = Catalog::new().with_offering("Day1", "Art", 5, &[1]);
        let err = generate(&catalog, &Configuration::default(), &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::MalformedCatalog(day) if day == "Day2"));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = Configuration {
            classes_per_student: 1,
            ..Configuration::default()
        };
        let err = generate(&roomy_catalog(), &config, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    #[test]
    fn same_seed_same_allocation() {
        let catalog = roomy_catalog();
        let config = Configuration::default();
        let a = generate(&catalog, &config, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = generate(&catalog, &config, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn remaining_seats_match_assignments() {
        let catalog = roomy_catalog();
        let (allocation, tracker) =
            allocate(&catalog, &Configuration::default(), &mut StdRng::seed_from_u64(3)).unwrap();
        for (day, offerings) in catalog.days() {
            for (name, offering) in offerings {
                let taken = allocation
                    .entries()
                    .filter(|(_, d, e)| *d == day && &e.name == name)
                    .count() as u32;
                assert_eq!(tracker.remaining(day, name), offering.capacity - taken);
            }
        }
    }

    #[test]
    fn seats_only_decrease_from_student_to_student() {
        // Tight seats so the fallback sweep runs for later students.
        let catalog = Catalog::new()
            .with_offering("Day1", "A", 3, &[1, 2])
            .with_offering("Day1", "B", 2, &[1, 3])
            .with_offering("Day1", "C", 4, &[2, 3])
            .with_offering("Day2", "D", 2, &[1])
            .with_offering("Day2", "E", 3, &[1, 2])
            .with_offering("Day2", "F", 1, &[2, 3]);
        let config = Configuration {
            student_count: 6,
            classes_per_student: 3,
            ..Configuration::default()
        };
        let days = config.day_ids();
        let day_offerings: DayOfferings = days
            .iter()
            .map(|day| (day, catalog.day(day).unwrap()))
            .collect();
        let snapshot = |tracker: &CapacityTracker| -> Vec<u32> {
            catalog
                .days()
                .flat_map(|(day, offerings)| {
                    offerings.keys().map(move |name| (day, name))
                })
                .map(|(day, name)| tracker.remaining(day, name))
                .collect()
        };

        let mut rng = StdRng::seed_from_u64(21);
        let mut tracker = CapacityTracker::from_catalog(&catalog);
        let mut allocation = Allocation::new();
        let mut before = snapshot(&tracker);
        let mut handed_out = 0;
        for student in config.student_ids() {
            let assigned = assign_student(
                &student,
                &config,
                &days,
                &day_offerings,
                &mut tracker,
                &mut allocation,
                &mut rng,
            );
            let after = snapshot(&tracker);
            assert!(
                before.iter().zip(&after).all(|(b, a)| a <= b),
                "{student}: {before:?} -> {after:?}"
            );
            let taken: u32 = before.iter().zip(&after).map(|(b, a)| b - a).sum();
            assert_eq!(taken as usize, assigned);
            handed_out += assigned;
            before = after;
        }
        // 15 seats for 18 requested classes.
        assert!(handed_out <= 15);
        assert!(handed_out < config.student_count * config.classes_per_student);
    }

    #[test]
    fn every_student_fills_with_slack() {
        let allocation = generate(
            &roomy_catalog(),
            &Configuration::default(),
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();
        assert_eq!(allocation.student_count(), 10);
        for (student, days) in allocation.students() {
            assert_eq!(allocation.class_count(student), 5);
            assert!(days.values().all(|entries| !entries.is_empty()));
            let names: HashSet<&str> = days
                .values()
                .flatten()
                .map(|e| e.name.as_str())
                .collect();
            assert_eq!(names.len(), 5);
        }
    }

    #[test]
    fn fallback_fills_from_any_day() {
        // Day2 has a single seat, so most students must take all four classes on Day1.
        let catalog = Catalog::new()
            .with_offering("Day1", "A", 10, &[1])
            .with_offering("Day1", "B", 10, &[2])
            .with_offering("Day1", "C", 10, &[3])
            .with_offering("Day1", "D", 10, &[4])
            .with_offering("Day1", "E", 10, &[5])
            .with_offering("Day2", "F", 1, &[1]);
        let config = Configuration {
            student_count: 3,
            classes_per_student: 4,
            min_classes_per_day: 1,
            ..Configuration::default()
        };
        let allocation = generate(&catalog, &config, &mut StdRng::seed_from_u64(5)).unwrap();
        for (student, _) in allocation.students() {
            assert_eq!(allocation.class_count(student), 4);
        }
        let day2_total: usize = allocation
            .students()
            .map(|(_, days)| days["Day2"].len())
            .sum();
        assert_eq!(day2_total, 1);
    }

    #[test]
    fn exhausted_catalog_leaves_shortfall() {
        let catalog = Catalog::new()
            .with_offering("Day1", "A", 1, &[1])
            .with_offering("Day2", "B", 1, &[1]);
        let config = Configuration {
            student_count: 2,
            classes_per_student: 2,
            ..Configuration::default()
        };
        let allocation = generate(&catalog, &config, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(allocation.total_classes(), 2);
        assert_eq!(allocation.student_count(), 2);
    }

    #[test]
    fn unassignable_offerings_are_never_chosen() {
        let catalog = Catalog::new()
            .with_offering("Day1", "Closed", 0, &[1, 2])
            .with_offering("Day1", "NoSlot", 5, &[])
            .with_offering("Day1", "Open", 5, &[3])
            .with_offering("Day2", "Other", 5, &[1]);
        let config = Configuration {
            student_count: 3,
            classes_per_student: 2,
            ..Configuration::default()
        };
        let allocation = generate(&catalog, &config, &mut StdRng::seed_from_u64(8)).unwrap();
        assert!(
            allocation
                .entries()
                .all(|(_, _, e)| e.name != "Closed" && e.name != "NoSlot")
        );
    }
}
