//! Human-readable resolution report
//!
//! The iteration engine itself never prints; it records everything in
//! [SolverStats] and emits structured `tracing` events. This module turns a
//! statistics record into the classical text table, for debugging sessions
//! and log files.

use super::stats::SolverStats;

fn push_cell(content: &mut String, value: &str, width: usize) {
    content.push_str(&format!(" {:width$}|", value, width = width));
}

/// Format the per-iteration history as a text table
pub fn iteration_report(stats: &SolverStats) -> String {
    let separation_line =
        "+-------+----------------+----------------+----------------+----------------+\n";
    let header = "|  it   |  natural lvl   | simplified lvl |  standard lvl  |    damping     |\n";

    let mut content = String::from("Damped Newton iteration\n");
    content.push_str("=======================\n\n");
    content.push_str(&format!(
        "iterations: {}, corrector steps: {}, rank-1 rejections: {}\n",
        stats.n_iter, stats.n_corr, stats.n_rej_rank1
    ));
    content.push_str(&format!(
        "function calls: {} (+ {} for jacobians), jacobian evaluations: {}\n",
        stats.n_fcn, stats.n_fcn_jac, stats.n_jac
    ));
    content.push_str(&format!(
        "tolerance: {:e}, achieved precision: {:e}\n\n",
        stats.rtol, stats.achieved_precision
    ));

    content.push_str(separation_line);
    content.push_str(header);
    content.push_str(separation_line);
    for it in 0..stats.natural_levels.len() {
        content.push('|');
        push_cell(&mut content, &format!("{}", it + 1), 6);
        push_cell(&mut content, &format!("{:.8e}", stats.natural_levels[it]), 15);
        push_cell(
            &mut content,
            &format!("{:.8e}", stats.simplified_levels[it]),
            15,
        );
        push_cell(
            &mut content,
            &format!("{:.8e}", stats.standard_levels[it]),
            15,
        );
        push_cell(
            &mut content,
            &format!("{:.8e}", stats.damping_factors[it]),
            15,
        );
        content.push('\n');
    }
    content.push_str(separation_line);
    content
}
