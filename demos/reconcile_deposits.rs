//! Reconcile a bank feed against a ledger on a background worker

use crossbeam_channel::unbounded;
use deposits_matcher_core::{
    spawn_reconciliation, DepositList, GroupingPreference, ListSide, MatcherConfig,
    ReconciliationEngine, ReconciliationInput, RunUpdate, SizePolicy,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("🧾 Deposits Matcher - Bank Feed vs Ledger\n");

    // Bank feed as pasted from a statement export
    let bank_feed = DepositList::parse_pasted(
        ListSide::A,
        "1250.00\n480.50\n320.00\n99.99\n1500.00\n75.25",
    )?;
    // Ledger entries as typed into the entry form
    let ledger = DepositList::parse(
        ListSide::B,
        &["800.50", "1250.00", "1500.00", "75.25", "12.00"],
    )?;

    for list in [&bank_feed, &ledger] {
        println!("📋 List {}:", list.side());
        for entry in list.entries() {
            println!("  {}  {}", entry.id, entry.amount);
        }
        println!();
    }

    let mut config = MatcherConfig::from_env();
    config.grouping = GroupingPreference::Finest;
    let engine = ReconciliationEngine::with_config(config)?;
    let input = ReconciliationInput::new(bank_feed, ledger)?;

    println!("⚙️  Running reconciliation...");
    let (sender, receiver) = unbounded();
    let handle = spawn_reconciliation(engine, input, SizePolicy::AbortOnWarning, sender);

    for update in receiver.iter() {
        match update {
            RunUpdate::Checkpoint(checkpoint) => println!("  ✓ {}", checkpoint),
            RunUpdate::Complete(outcome) => {
                let report = outcome.report;
                println!("\n📊 Result (run {}, {} ms):", handle.run_id(), outcome.elapsed_ms);
                println!("{}\n", report.summary_text());

                for set in &report.related_sets {
                    println!(
                        "  {}: {} = {}  ({})",
                        set.id,
                        set.describe(ListSide::A),
                        set.describe(ListSide::B),
                        set.sum
                    );
                }

                for side in [ListSide::A, ListSide::B] {
                    for record in report.unmatched(side) {
                        println!("  ✗ Unmatched {}: {}", record.id, record.amount);
                    }
                }

                #[cfg(feature = "xlsx")]
                {
                    use deposits_matcher_core::{ReportExporter, XlsxExporter};

                    let path = std::env::temp_dir().join("deposits_matcher.xlsx");
                    XlsxExporter::new().export(&report, &path)?;
                    println!("\n💾 Workbook written to {}", path.display());
                }
            }
            RunUpdate::Aborted { warnings } => {
                println!("\n⚠️  Aborted:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            RunUpdate::Failed(error) => return Err(error.into()),
            RunUpdate::Cancelled => println!("\n🛑 Cancelled"),
        }
    }

    Ok(())
}
