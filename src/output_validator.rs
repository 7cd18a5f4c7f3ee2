//! Completeness scoring for a rendered allocation.
//!
//! Compares the allocation and its rendered text against the configuration
//! and turns every gap it finds into an issue. The score starts at 100 and
//! loses a fixed penalty per issue; this component only reports, it never
//! fails.

use crate::data::{Allocation, ClarityReport, Configuration};
use log::debug;

/// Issue count at which the score bottoms out.
const MAX_EXPECTED_ISSUES: f64 = 15.0;
/// Renderings shorter than this are treated as truncated.
const MIN_RENDERED_CHARS: usize = 100;
const TABLE_MARKERS: [char; 3] = ['+', '|', '─'];

pub fn score(config: &Configuration, allocation: &Allocation, rendered: &str) -> ClarityReport {
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();
    let days = config.day_ids();

    if allocation.student_count() != config.student_count {
        issues.push(format!(
            "Expected {} students, found {}",
            config.student_count,
            allocation.student_count()
        ));
    }

    for (student, schedule) in allocation.students() {
        if days.iter().any(|day| !schedule.contains_key(day)) {
            issues.push(format!("{student} is missing day information"));
        } else if days.iter().any(|day| schedule[day].is_empty()) {
            issues.push(format!("{student} has empty classes for one or more days"));
        }
    }

    let rendered_len = rendered.chars().count();
    if rendered_len < MIN_RENDERED_CHARS {
        issues.push("Formatted output is missing or too short".to_string());
        suggestions.push("Ensure the table includes headers and all student rows".to_string());
    }

    if !rendered.is_empty() {
        if !rendered.contains("Student") {
            issues.push("Formatted output missing 'Student' column header".to_string());
        }
        for (i, day) in days.iter().enumerate() {
            let spaced = format!("Day {}", i + 1);
            if !rendered.contains(&spaced) && !rendered.contains(day.as_str()) {
                issues.push(format!("Formatted output missing {spaced} information"));
            }
        }
        if !rendered.contains(TABLE_MARKERS) {
            issues.push("Formatted output has no table structure".to_string());
            suggestions.push("Consider using a table format for better readability".to_string());
        }
    }

    for (student, _) in allocation.students() {
        let count = allocation.class_count(student);
        if count != config.classes_per_student {
            issues.push(format!(
                "{student} has {count} classes instead of {}",
                config.classes_per_student
            ));
        }
    }

    if !rendered.is_empty() && !rendered.contains("(P") {
        suggestions.push("Consider showing period information for better clarity".to_string());
    }

    let penalty = issues.len() as f64 * (100.0 / MAX_EXPECTED_ISSUES);
    let clarity_score = ((100.0 - penalty).max(0.0) * 10.0).round() / 10.0;

    let summary = if clarity_score >= 90.0 {
        "Output is clear, complete, and easy to understand"
    } else if clarity_score >= 70.0 {
        "Output is acceptable but could be improved"
    } else {
        "Output has significant clarity or completeness issues"
    };

    if clarity_score < 100.0 && suggestions.is_empty() {
        suggestions
            .push("Review the output to ensure all information is clearly presented".to_string());
    }

    debug!(
        "clarity score {clarity_score} with {} issue(s) over {rendered_len} chars",
        issues.len()
    );

    ClarityReport {
        valid: issues.is_empty(),
        clarity_score,
        summary: summary.to_string(),
        issues,
        suggestions,
        student_count: allocation.student_count(),
        total_classes: allocation.total_classes(),
        formatted_output_length: rendered_len,
    }
}
