use livegrid_engine::{DocumentSchema, Engine, FormatDetector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Log a one-line snapshot summary every `interval`
pub async fn run<S, D>(engine: Arc<Engine<S, D>>, interval: Duration)
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        tracing::info!("[{}] {} | {}", engine.detector_name(), engine.snapshot(), summary(&engine));
    }
}

fn summary<S, D>(engine: &Engine<S, D>) -> String
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    let stats = engine.stats();
    format!(
        "packets applied={} unrecognized={} rejected={}",
        stats.applied, stats.unrecognized, stats.rejected
    )
}
