use budget_demo::models::{Budget, BudgetItem};
use budget_demo::Config;
use persist_engine::Persister;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging(&config)?;

    tracing::info!("Starting budget demo");
    tracing::info!("Configuration: {:?}", config);

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let engine = Persister::open(&config.database.path)?;
    tracing::info!(path = %config.database.path, "database opened");

    let mut groceries = BudgetItem::new("Groceries", 250.0);
    let mut rent = BudgetItem::new("Rent", 1200.0);
    engine.save(&mut groceries)?;
    engine.save(&mut rent)?;
    engine.index_completion("BudgetItem", "label", &groceries.label)?;
    engine.index_completion("BudgetItem", "label", &rent.label)?;

    let mut budget = Budget::new(chrono::Utc::now().fixed_offset(), groceries.budgeted + rent.budgeted);
    engine.save(&mut budget)?;
    budget.items = vec![groceries, rent];
    engine.save(&mut budget)?;

    let saved: Vec<Budget> = engine.retrieve()?;
    tracing::info!(count = saved.len(), "budgets on file");
    for b in &saved {
        tracing::info!(id = ?b.id, items = b.items.len(), "budget");
    }

    if let Some(outcome) = engine.undo() {
        tracing::info!(?outcome, "undid last mutation");
    }

    let matches = engine.completions("BudgetItem", "label", "")?;
    tracing::info!(?matches, "indexed budget item labels");

    Ok(())
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    Ok(())
}
