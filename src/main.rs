use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use transferopt::fake_provider::FakeProvider;
use transferopt::pipeline::{BatchRequest, solve_batch};
use transferopt::provider::{DataProvider, HttpProvider};
use transferopt::report::{export_workbook, render_detail_table, render_summary_line};
use transferopt::solver::{BranchBound, MipSolver, SolveLimits};
use transferopt::squad::OptimizeOptions;

struct CliArgs {
    teams: Vec<String>,
    new_squad: bool,
    age_limit: Option<u32>,
    budget_limit: Option<i64>,
    /// Budget caps for a sweep over the first team (or the new-squad build).
    budget_sweep: Vec<i64>,
    offline: bool,
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = parse_args()?;
    if args.teams.is_empty() && !args.new_squad {
        print_usage();
        return Ok(());
    }

    let requests = build_requests(&args);
    let limits = SolveLimits {
        timeout: solver_timeout(),
    };

    let outcome = if args.offline {
        let provider = FakeProvider::demo();
        run(&provider, &requests, &limits)
    } else {
        let provider = HttpProvider::from_env();
        run(&provider, &requests, &limits)
    };

    for result in &outcome.runs {
        println!("\n*** {} ***", result.team_label());
        print!("{}", render_detail_table(result));
        println!("{}", render_summary_line(&result.summary));
    }
    for error in &outcome.errors {
        eprintln!("FAILED {error}");
    }

    if let Some(path) = args.export.as_deref() {
        export_workbook(path, &outcome.runs)?;
        println!("\nWrote {}", path.display());
    }

    if outcome.runs.is_empty() && !outcome.errors.is_empty() {
        anyhow::bail!("every run failed");
    }
    Ok(())
}

fn run(
    provider: &dyn DataProvider,
    requests: &[BatchRequest],
    limits: &SolveLimits,
) -> transferopt::pipeline::BatchOutcome {
    solve_batch(
        provider,
        || Ok(Box::new(BranchBound::new()) as Box<dyn MipSolver>),
        requests,
        limits,
    )
}

fn build_requests(args: &CliArgs) -> Vec<BatchRequest> {
    let base = OptimizeOptions {
        age_limit: args.age_limit,
        budget_limit: args.budget_limit,
    };

    let mut targets: Vec<Option<String>> = args.teams.iter().cloned().map(Some).collect();
    if args.new_squad {
        targets.push(None);
    }

    if args.budget_sweep.is_empty() {
        return targets
            .into_iter()
            .map(|team| BatchRequest {
                team,
                options: base.clone(),
            })
            .collect();
    }

    // Sweep mode: one run per cap for the first target only.
    let team = targets.into_iter().next().unwrap_or(None);
    args.budget_sweep
        .iter()
        .map(|&cap| BatchRequest {
            team: team.clone(),
            options: OptimizeOptions {
                budget_limit: Some(cap),
                ..base.clone()
            },
        })
        .collect()
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs {
        teams: Vec::new(),
        new_squad: false,
        age_limit: None,
        budget_limit: None,
        budget_sweep: Vec::new(),
        offline: false,
        export: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--new-squad" => args.new_squad = true,
            "--offline" => args.offline = true,
            "--age-limit" => {
                let val = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--age-limit needs a value"))?;
                args.age_limit = Some(val.parse()?);
            }
            "--budget" => {
                let val = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--budget needs a value"))?;
                args.budget_limit = Some(val.parse()?);
            }
            "--budget-sweep" => {
                let val = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--budget-sweep needs a comma list"))?;
                args.budget_sweep = val
                    .split(',')
                    .map(|s| s.trim().parse::<i64>())
                    .collect::<Result<_, _>>()?;
            }
            "--export" => {
                let val = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--export needs a path"))?;
                args.export = Some(PathBuf::from(val));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                anyhow::bail!("unknown flag {other}");
            }
            team => args.teams.push(team.to_string()),
        }
    }
    Ok(args)
}

fn solver_timeout() -> Option<Duration> {
    std::env::var("SOLVER_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn print_usage() {
    println!("usage: transferopt [TEAM ...] [options]");
    println!();
    println!("  --age-limit N        cap candidate age");
    println!("  --budget N           override the team's transfer budget");
    println!("  --budget-sweep A,B   run the first target once per budget cap");
    println!("  --new-squad          build an eleven from scratch (forced transfers)");
    println!("  --offline            use the built-in demo catalog, no network");
    println!("  --export PATH        write an xlsx workbook with all results");
    println!();
    println!("env: CATALOG_BASE_URL, CATALOG_PAGES, FETCH_PARALLELISM,");
    println!("     SOLVER_TIMEOUT_SECS, HTTP_TIMEOUT_SECS");
}
