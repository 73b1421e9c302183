use crate::output::read_summary;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a run summary JSON file
///
/// # Errors
/// * Unreadable or malformed JSON
/// * Summary written with another major schema version
pub fn validate_summary_file(file_path: PathBuf) -> Result<()> {
    println!("Validating summary: {}", file_path.display());

    let summary = read_summary(&file_path)?;

    if major(&summary.version) != major(SCHEMA_VERSION) {
        anyhow::bail!(
            "Unsupported summary version {} (expected {})",
            summary.version,
            SCHEMA_VERSION
        );
    }

    println!("✓ Valid summary JSON");
    println!("  Version: {}", summary.version);
    println!("  Input: {}", summary.input_dir);
    if let Some(job_id) = summary.job_id {
        println!("  Job: {}", job_id);
    }
    if let Some(total) = summary.total_num_calls {
        println!("  Total Calls: {}", total);
    }
    println!("  Steps: {}", summary.steps.len());
    println!("  Communicators: {}", summary.communicators.len());
    println!("  Outliers: {}", summary.outliers.len());

    Ok(())
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("A2A Analyzer Summary Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string            - Schema version (e.g., '1.0.0')");
        println!("  generated_at: string       - ISO 8601 timestamp");
        println!("  input_dir: string          - Analyzed directory");
        println!("  job_id: number?            - Job of the counter files");
        println!("  total_num_calls: number?   - Calls over every communicator");
        println!("  steps: array               - Executed steps, in order");
        println!("    step: number             - Step number (1-7)");
        println!("    label: string            - Step description");
        println!("    duration_ms: number      - Wall time of the step");
        println!("  communicators: array       - One entry per lead rank");
        println!("    lead_rank: number        - Lowest rank of the communicator");
        println!("    num_calls: number        - Calls with counts");
        println!("    patterns: number         - Distinct send/recv patterns");
        println!("    one_to_n: number         - 1 -> N patterns");
        println!("    n_to_n: number           - N -> N patterns");
        println!("    n_to_one: number         - N -> 1 patterns");
        println!("    empty: number            - Calls without any data");
        println!("  outliers: array            - Calls whose timings split into groups");
        println!("    comm: object             - lead_rank and comm_id");
        println!("    call: number             - Call ID");
        println!("    kind: string             - execution or late_arrival");
        println!("    groups: array            - Ranks of each group");
        println!("  plots: object?             - rendered (image count) or skipped (reason)");
        println!("  highlights: string?        - Multi-communicator report path");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("A2A Analyzer v{}", env!("CARGO_PKG_VERSION"));
    println!("Summary Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Post-mortem analysis of alltoallv counters and timings.");
}
