use chrono::Duration;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::stability::metrics::StabilityData;
use crate::stability::model::{FailureRate, MttrRecord};

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn color_coded_failure_cell(rate: f64) -> Cell {
    let text = format!("{rate:.2}%");
    if rate >= 50.0 {
        Cell::new(text).fg(TableColor::Red)
    } else if rate >= 25.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Green)
    }
}

/// Render a duration as "2d 3h 20m" style text, dropping leading zero
/// units.
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    let (days, hours, minutes) = (minutes / 1440, minutes % 1440 / 60, minutes % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Overall and per-job failure rates as one table; the overall rate is
/// the first row.
pub fn failure_rate_table(data: &StabilityData) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Scope", "Failure rate", "Failed", "Successful"]);
    table.add_row(failure_rate_row("all pipeline runs", &data.pipeline_failure_rate));
    for rate in &data.job_failure_rates {
        table.add_row(failure_rate_row(
            rate.name.as_deref().unwrap_or("(unnamed)"),
            rate,
        ));
    }
    table
}

fn failure_rate_row(label: &str, rate: &FailureRate) -> Vec<Cell> {
    vec![
        Cell::new(label),
        color_coded_failure_cell(rate.failure_rate),
        Cell::new(rate.number_of_failed),
        Cell::new(rate.number_of_success),
    ]
}

pub fn mttr_table(records: &[MttrRecord]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Pipeline", "MTTR", "Runs", "Comment"]);
    for record in records {
        let mttr = record
            .mttr
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&record.pipeline_name),
            Cell::new(mttr),
            Cell::new(record.number_of_runs),
            Cell::new(record.comment.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations_human_readably() {
        assert_eq!(format_duration(Duration::minutes(16)), "16m");
        assert_eq!(format_duration(Duration::minutes(140)), "2h 20m");
        assert_eq!(format_duration(Duration::minutes(3020)), "2d 2h 20m");
    }

    #[test]
    fn overall_rate_is_the_first_table_row() {
        let data = StabilityData {
            pipeline_failure_rate: FailureRate {
                failure_rate: 50.0,
                number_of_success: 1,
                number_of_failed: 1,
                name: None,
            },
            job_failure_rates: vec![],
            pipeline_mttrs: vec![],
        };
        let rendered = failure_rate_table(&data).to_string();
        assert!(rendered.contains("all pipeline runs"));
        assert!(rendered.contains("50.00%"));
    }

    #[test]
    fn undefined_mttr_renders_a_dash_and_the_comment() {
        let records = vec![MttrRecord {
            pipeline_name: "build:deploy".to_string(),
            mttr: None,
            number_of_runs: 3,
            comment: Some("All 3 run(s) failed, nothing was restored".to_string()),
        }];
        let rendered = mttr_table(&records).to_string();
        assert!(rendered.contains('-'));
        assert!(rendered.contains("run(s) failed"));
    }
}
