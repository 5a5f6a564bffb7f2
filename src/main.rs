// ANS Indicator Engine - CLI
// compute: batch-compute component and indicator reports from CSV extracts
// reconcile: additionally diff recomputed indicators against published ones

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

use ans_indicators::{
    aggregate, attach_net_results, filter_with_roster, load_net_results, write_component_report,
    write_indicator_report, write_reconciliation_report, CsvLedgerSource, CsvRosterSource,
    CsvStoredIndicatorSource, EngineConfig, HistoryIndex, IndicatorCalculator, IndicatorSet,
    LedgerSource, ReconciliationEngine, RosterIndex, RosterSource, StoredIndicatorSource,
    SummaryMap, VERSION,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("compute") => run_compute(&args[2..]),
        Some("reconcile") => run_reconcile(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("ans-indicators {} - RN 518 indicator engine", VERSION);
    println!();
    println!("Usage:");
    println!("  ans-indicators compute <ledger.csv> <roster.csv> <out-dir> [options]");
    println!("  ans-indicators reconcile <ledger.csv> <roster.csv> <stored.csv> <out-dir> [options]");
    println!();
    println!("Options:");
    println!("  --config <file.json>       engine configuration");
    println!("  --net-results <file.csv>   net-result supplement per operadora/quarter");
}

// ============================================================================
// ARGUMENT PARSING
// ============================================================================

struct CliArgs {
    positional: Vec<String>,
    config: Option<PathBuf>,
    net_results: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut net_results = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config requires a file path")?;
                config = Some(PathBuf::from(value));
            }
            "--net-results" => {
                let value = iter.next().context("--net-results requires a file path")?;
                net_results = Some(PathBuf::from(value));
            }
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            other => positional.push(other.to_string()),
        }
    }

    Ok(CliArgs {
        positional,
        config,
        net_results,
    })
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    match &args.config {
        Some(path) => {
            let config = EngineConfig::from_file(path)?;
            println!("✓ Config loaded from {:?}", path);
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Shared pipeline of both modes: load, classify, aggregate, filter, compute
fn run_pipeline(
    config: &EngineConfig,
    ledger_path: &str,
    roster_path: &str,
    net_results: &Option<PathBuf>,
) -> Result<(SummaryMap, Vec<IndicatorSet>)> {
    let engine = config.rule_engine()?;

    println!("\n📂 Loading sources...");
    let entries = CsvLedgerSource::new(ledger_path).load()?;
    println!("✓ Loaded {} ledger entries", entries.len());

    let roster_records = CsvRosterSource::new(roster_path).load()?;
    println!("✓ Loaded {} roster records", roster_records.len());

    println!("\n➕ Aggregating components...");
    let summaries = aggregate(&entries, &engine);
    let roster = RosterIndex::build(roster_records);
    let mut filtered = filter_with_roster(summaries, &roster, config);
    println!("✓ {} qualifying operadora/quarter groups", filtered.len());

    if let Some(path) = net_results {
        let supplements = load_net_results(path)?;
        attach_net_results(&mut filtered, &supplements);
        println!("✓ Attached {} net-result supplements", supplements.len());
    }

    println!("\n📈 Computing indicators...");
    let history = HistoryIndex::from_summaries(&filtered);
    let sets = IndicatorCalculator::from_config(config).compute_all(&filtered, &history);
    println!("✓ Computed {} indicator sets", sets.len());

    Ok((filtered, sets))
}

fn create_report_file(out_dir: &Path, name: &str) -> Result<File> {
    let path = out_dir.join(name);
    File::create(&path).with_context(|| format!("Failed to create report file: {:?}", path))
}

// ============================================================================
// COMPUTE MODE
// ============================================================================

fn run_compute(args: &[String]) -> Result<()> {
    let args = parse_args(args)?;
    if args.positional.len() != 3 {
        print_usage();
        bail!("compute expects <ledger.csv> <roster.csv> <out-dir>");
    }

    println!("📊 RN 518 indicator batch");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = load_config(&args)?;
    let (summaries, sets) = run_pipeline(
        &config,
        &args.positional[0],
        &args.positional[1],
        &args.net_results,
    )?;

    let out_dir = Path::new(&args.positional[2]);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    println!("\n💾 Writing reports...");
    let rows = write_component_report(create_report_file(out_dir, "relatorio_componentes.csv")?, &summaries)?;
    println!("✓ relatorio_componentes.csv ({} rows)", rows);

    let rows = write_indicator_report(
        create_report_file(out_dir, "relatorio_indicadores.csv")?,
        &summaries,
        &sets,
    )?;
    println!("✓ relatorio_indicadores.csv ({} rows)", rows);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Batch complete");

    Ok(())
}

// ============================================================================
// RECONCILE MODE
// ============================================================================

fn run_reconcile(args: &[String]) -> Result<()> {
    let args = parse_args(args)?;
    if args.positional.len() != 4 {
        print_usage();
        bail!("reconcile expects <ledger.csv> <roster.csv> <stored.csv> <out-dir>");
    }

    println!("⚖️  RN 518 indicator reconciliation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = load_config(&args)?;
    let (summaries, recomputed) = run_pipeline(
        &config,
        &args.positional[0],
        &args.positional[1],
        &args.net_results,
    )?;

    println!("\n📂 Loading stored indicators...");
    let stored = CsvStoredIndicatorSource::new(args.positional[2].as_str()).load()?;
    println!("✓ Loaded {} stored indicator sets", stored.len());

    println!("\n⚖️  Reconciling...");
    let report = ReconciliationEngine::with_epsilon(config.epsilon).reconcile_all(&stored, &recomputed);
    println!("✓ {}", report.summary());

    let out_dir = Path::new(&args.positional[3]);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    println!("\n💾 Writing reports...");
    let rows = write_component_report(create_report_file(out_dir, "relatorio_componentes.csv")?, &summaries)?;
    println!("✓ relatorio_componentes.csv ({} rows)", rows);

    let rows = write_indicator_report(
        create_report_file(out_dir, "relatorio_indicadores.csv")?,
        &summaries,
        &recomputed,
    )?;
    println!("✓ relatorio_indicadores.csv ({} rows)", rows);

    let rows = write_reconciliation_report(
        create_report_file(out_dir, "relatorio_reconciliacao.csv")?,
        &report,
        config.include_clean_rows,
    )?;
    println!("✓ relatorio_reconciliacao.csv ({} rows)", rows);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.is_clean() {
        println!("✅ Reconciliation clean: no divergence beyond {}", report.epsilon);
    } else {
        println!("❗ {} divergent indicator values", report.mismatch_count());
    }

    Ok(())
}
