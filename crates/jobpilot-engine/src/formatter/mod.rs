use crate::jobs::{JobOutcomes, JobRecord};

const RULE_WIDTH: usize = 50;

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

pub fn status_label(succeeded: bool) -> &'static str {
    if succeeded { "✓ Success" } else { "✗ Failed" }
}

/// Listing report. `debug_screenshot` is named in the hint shown when the
/// listing came back empty.
pub fn format_job_list(jobs: &[JobRecord], debug_screenshot: &str) -> String {
    if jobs.is_empty() {
        return format!(
            "No jobs found. The page structure may be different.\n\
             Check '{}' for a screenshot of the current page.",
            debug_screenshot
        );
    }

    let mut output = format!("Available Jobs:\n{}", rule());
    for job in jobs {
        output.push_str(&format!("\n  - {}", job.name));
    }
    output.push_str(&format!("\n\nTotal: {} jobs found", jobs.len()));
    output
}

/// One line per triggered job, printed as the flow progresses.
pub fn format_trigger_line(job_name: &str, succeeded: bool) -> String {
    if succeeded {
        format!("✓ Successfully triggered job: {}", job_name)
    } else {
        format!("✗ Failed to trigger job: {}", job_name)
    }
}

/// Outcome table under `title`, followed by a success count.
pub fn format_outcomes(title: &str, outcomes: &JobOutcomes) -> String {
    let mut output = format!("{}:\n{}", title, rule());
    if outcomes.is_empty() {
        output.push_str("\n  (no jobs run)");
        return output;
    }
    for outcome in outcomes {
        output.push_str(&format!(
            "\n  {}: {}",
            status_label(outcome.succeeded),
            outcome.name
        ));
    }
    output.push_str(&format!(
        "\n\n{} of {} jobs triggered",
        outcomes.succeeded(),
        outcomes.len()
    ));
    output
}
