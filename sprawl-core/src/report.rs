// Text report for benchmark outcomes

use crate::benchmark::BenchmarkOutcome;
use sprawl_scanner::result::TraversalReport;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

pub fn generate_benchmark_report(outcomes: &[BenchmarkOutcome]) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                        SPRAWL CRAWLER BENCHMARK REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    if outcomes.is_empty() {
        report.push_str("No benchmark runs were requested.\n\n");
    }

    for outcome in outcomes {
        let label = outcome.mode.label();
        let ms = outcome.deadline.as_millis();

        report.push_str(&format!("({}) CRAWLER\n", label));
        report.push_str(LIGHT_RULE);
        report.push_str(&format!(
            "({}) Benchmark for {}ms -> {} URLs crawled.\n\n",
            label, ms, outcome.nodes
        ));
        report.push_str(&format_traversal_stats(&outcome.report));

        if let Some(ref run_id) = outcome.run_id {
            report.push_str(&format!("Run ID:         {}\n", run_id));
        }
        report.push('\n');

        if let Some(ref ranks) = outcome.ranks {
            report.push_str("URLs by rank:\n");
            if ranks.is_empty() {
                report.push_str("  (no URLs persisted)\n");
            }
            for (idx, rank) in ranks.iter().enumerate() {
                report.push_str(&format!("  {:>3}. {}\n", idx + 1, rank));
            }
            report.push('\n');
        }
    }

    if let [first, second] = outcomes
        && first.mode != second.mode
    {
        report.push_str(HEAVY_RULE);
        report.push_str("COMPARISON\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');
        for outcome in [first, second] {
            report.push_str(&format!(
                "  {:<6} {:>8.1} URLs/s\n",
                outcome.mode.label(),
                throughput(outcome)
            ));
        }
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);

    report
}

fn format_traversal_stats(report: &TraversalReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Stopped:        {}\n", report.stop_reason));
    out.push_str(&format!("Elapsed:        {}ms\n", report.elapsed.as_millis()));
    out.push_str(&format!("Levels:         {}\n", report.levels_completed));
    out.push_str(&format!("Requested:      {}\n", report.pages_requested));
    out.push_str(&format!(
        "Edges:          {} tree, {} non-tree, {} dropped\n",
        report.tree_edges, report.non_tree_edges, report.dropped_edges
    ));
    out.push_str(&format!(
        "Persisted:      {} ({} failed)\n",
        report.edges_persisted, report.persist_failures
    ));
    out
}

/// Persisted URLs per second of the run's deadline.
pub fn throughput(outcome: &BenchmarkOutcome) -> f64 {
    let secs = outcome.deadline.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    outcome.nodes as f64 / secs
}
