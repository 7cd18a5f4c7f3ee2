use crate::checkers;
use crate::data::{Allocation, Catalog, ClarityReport, Configuration, ValidationReport};
use crate::error::Result;
use crate::formatter::render_table;
use crate::output_validator;
use crate::solver;
use crate::stats::{self, ScheduleStatistics};
use log::{info, warn};
use rand::Rng;
use serde::Serialize;

/// Everything produced by one generate-check-render pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRun {
    pub allocation: Allocation,
    pub reports: Vec<ValidationReport>,
    pub formatted_output: String,
    pub clarity: ClarityReport,
    pub statistics: ScheduleStatistics,
}

impl ScheduleRun {
    pub fn all_checks_passed(&self) -> bool {
        self.reports.iter().all(|r| r.valid)
    }
}

pub fn run_schedule<R: Rng + ?Sized>(
    catalog: &Catalog,
    config: &Configuration,
    rng: &mut R,
) -> Result<ScheduleRun> {
    let allocation = solver::generate(catalog, config, rng)?;
    let reports = checkers::run_all(config, &allocation, catalog);
    for report in reports.iter().filter(|r| !r.valid) {
        warn!("{report}");
    }

    let formatted_output = render_table(&allocation, &config.day_ids());
    let clarity = output_validator::score(config, &allocation, &formatted_output);
    let statistics = stats::collect(config, &allocation, catalog, &reports);
    info!(
        "Run finished: {}/{} checks passed, clarity {}",
        statistics.validation.checks_passed, statistics.validation.total_validation_checks,
        clarity.clarity_score
    );

    Ok(ScheduleRun {
        allocation,
        reports,
        formatted_output,
        clarity,
        statistics,
    })
}
