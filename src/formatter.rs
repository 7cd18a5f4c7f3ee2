use crate::data::{Allocation, DayId, StudentId};
use itertools::Itertools;

/// Renders the allocation as a grid table, one row per student and one
/// column per day.
pub fn render_table(allocation: &Allocation, days: &[DayId]) -> String {
    let mut headers = vec!["Student".to_string()];
    headers.extend(days.iter().map(|day| format!("{} Classes (Period)", day_label(day))));

    let rows: Vec<Vec<String>> = allocation
        .students()
        .sorted_by(|(a, _), (b, _)| natural_key(a).cmp(&natural_key(b)))
        .map(|(student, schedule)| {
            let mut row = vec![student.clone()];
            row.extend(days.iter().map(|day| {
                match schedule.get(day).filter(|entries| !entries.is_empty()) {
                    Some(entries) => entries.iter().join(", "),
                    None => "(none)".to_string(),
                }
            }));
            row
        })
        .collect();

    let widths: Vec<usize> = (0..headers.len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(headers[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = vec![rule(&widths, '-'), line(&headers, &widths), rule(&widths, '=')];
    for row in &rows {
        out.push(line(row, &widths));
        out.push(rule(&widths, '-'));
    }
    if rows.is_empty() {
        out.pop();
        out.push(rule(&widths, '-'));
    }
    out.join("\n")
}

/// `Day2` reads as `Day 2` in headers.
fn day_label(day: &str) -> String {
    match day.find(|c: char| c.is_ascii_digit()) {
        Some(split) if split > 0 && !day[..split].ends_with(' ') => {
            format!("{} {}", &day[..split], &day[split..])
        }
        _ => day.to_string(),
    }
}

/// Orders `Student2` before `Student10`.
fn natural_key(id: &StudentId) -> (usize, &str) {
    (id.len(), id.as_str())
}

fn rule(widths: &[usize], fill: char) -> String {
    let cells = widths
        .iter()
        .map(|w| fill.to_string().repeat(w + 2))
        .join("+");
    format!("+{cells}+")
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let cells = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!(" {cell:<w$} "))
        .join("|");
    format!("|{cells}|")
}
