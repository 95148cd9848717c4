//! Plain-text rendering for the CLI.
//!
//! Everything here turns already-computed results into strings; nothing
//! talks to stdout directly and nothing here can fail.

use std::fmt::Write;

use fraction::ToPrimitive;

use crate::config::AppConfig;
use crate::distribution::Distribution;
use crate::expression::{Expression, ExpressionInfo, Term};
use crate::history::RollHistory;
use crate::roller::RollRecord;
use crate::stats::StatisticsSummary;

const BAR_WIDTH: usize = 40;

pub fn roll_result(
    expr: &Expression,
    records: &[RollRecord],
    summary: &StatisticsSummary,
    verbose: bool,
    show_stats: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{expr}");

    if records.len() == 1 {
        let _ = writeln!(out, "total: {}", records[0].total);
    } else {
        let _ = writeln!(
            out,
            "rolled {} times: mean {:.4} (theoretical {:.4}), min {}, max {}",
            summary.count, summary.mean, summary.theoretical_mean, summary.min, summary.max
        );
    }

    if verbose {
        for (i, record) in records.iter().enumerate() {
            let _ = write!(out, "  #{:<4}", i + 1);
            let mut groups = record.faces.iter().zip(record.group_totals());
            for term in expr.terms() {
                if let Term::Dice(dice) = term {
                    if let Some((faces, sum)) = groups.next() {
                        let _ =
                            write!(out, " {}d{}:{:?}={}", dice.count, dice.sides, faces, sum);
                    }
                }
            }
            let _ = writeln!(out, " => {}", record.total);
        }
    }

    if show_stats {
        out.push('\n');
        out.push_str(&statistics(summary));
    }
    out
}

pub fn statistics(summary: &StatisticsSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "statistics over {} rolls", summary.count);
    let _ = writeln!(out, "  mean:             {:.4}", summary.mean);
    let _ = writeln!(out, "  theoretical mean: {:.4}", summary.theoretical_mean);
    let _ = writeln!(out, "  deviation:        {:.4}", summary.mean_deviation());
    let _ = writeln!(out, "  std dev:          {:.4}", summary.std_dev);
    let _ = writeln!(out, "  min / max:        {} / {}", summary.min, summary.max);
    let _ = writeln!(out, "  distribution:");

    let largest = summary
        .frequency
        .values()
        .map(|f| f.count)
        .max()
        .unwrap_or(1);
    for (total, freq) in &summary.frequency {
        let _ = writeln!(
            out,
            "  {total:>6} {} {:>6.2}% ({})",
            bar(freq.count, largest),
            freq.percentage,
            freq.count
        );
    }
    out
}

pub fn analysis(expr: &Expression, dist: &Distribution, extended: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{expr}");
    let _ = writeln!(out, "  min / max:        {} / {}", dist.min(), dist.max());
    let _ = writeln!(out, "  theoretical mean: {:.4}", dist.mean_f64());
    let _ = writeln!(out, "  median:           {}", dist.median());
    let _ = writeln!(out, "  modes:            {:?}", dist.modes());
    let _ = writeln!(out, "  distribution:");

    let probabilities: Vec<(i64, f64)> = dist
        .pmf()
        .iter()
        .map(|(v, p)| (*v, p.to_f64().unwrap_or(0.0)))
        .collect();
    let largest = probabilities
        .iter()
        .map(|&(_, p)| p)
        .fold(0.0_f64, f64::max);
    for (value, p) in &probabilities {
        let filled = if largest > 0.0 {
            ((p / largest) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let mut row = "▓".repeat(filled.min(BAR_WIDTH));
        row.push_str(&"░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));
        let _ = writeln!(out, "  {value:>6} {row} {:>6.2}%", p * 100.0);
    }

    if extended {
        let _ = writeln!(out, "  extended:");
        let _ = writeln!(out, "    std dev:     {:.4}", dist.std_dev_f64());
        let _ = writeln!(out, "    skewness:    {:.4}", dist.skewness());
        let _ = writeln!(out, "    kurtosis:    {:.4}", dist.kurtosis());
        for percentile in [0.05, 0.25, 0.5, 0.75, 0.95] {
            if let Some(value) = dist.percentile(percentile) {
                let _ = writeln!(out, "    p{:<4} {value}", (percentile * 100.0) as u32);
            }
        }
    }
    out
}

pub fn info(info: &ExpressionInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", info.expression);
    let _ = writeln!(out, "  dice groups:      {}", info.dice_groups);
    let _ = writeln!(out, "  total dice:       {}", info.total_dice);
    let _ = writeln!(out, "  min / max:        {} / {}", info.min_value, info.max_value);
    let _ = writeln!(out, "  theoretical mean: {:.4}", info.theoretical_mean);
    out
}

pub fn history(history: &RollHistory, limit: usize) -> String {
    if history.is_empty() {
        return "no recorded sessions\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{} recorded sessions, showing {}", history.len(), history.recent(limit).len());
    for session in history.recent(limit) {
        let seed = match session.seed {
            Some(seed) => format!(", seed {seed}"),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "  {}  {}  x{}  mean {:.4} (theoretical {:.4}){}",
            session.timestamp.format("%Y-%m-%d %H:%M:%S"),
            session.expression,
            session.iterations,
            session.mean,
            session.theoretical_mean,
            seed
        );
    }
    out
}

pub fn config(config: &AppConfig, dir: &std::path::Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "configuration ({})", dir.display());
    let _ = writeln!(out, "  default_iterations: {}", config.default_iterations);
    let _ = writeln!(
        out,
        "  default_seed:       {}",
        config
            .default_seed
            .map_or_else(|| "null".to_string(), |s| s.to_string())
    );
    let _ = writeln!(out, "  output_format:      {}", config.output_format);
    let _ = writeln!(out, "  verbose:            {}", config.verbose);
    let _ = writeln!(out, "  show_stats:         {}", config.show_stats);
    let _ = writeln!(out, "  history_limit:      {}", config.history_limit);
    out
}

fn bar(count: u64, largest: u64) -> String {
    let filled = ((count as f64 / largest as f64) * BAR_WIDTH as f64).round() as usize;
    let mut bar = "▓".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));
    bar
}
