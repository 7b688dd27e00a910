use std::sync::Arc;

use crate::feed::FeedSource;
use crate::generation::generator::ApplicationGenerator;
use crate::generation::relevance::RelevanceScorer;
use crate::notify::Notifier;
use crate::output::OutputWriter;

/// Everything a run needs, built once in `main` and borrowed by the pipeline.
pub struct AppState {
    pub feed: Arc<dyn FeedSource>,
    pub scorer: RelevanceScorer,
    pub generator: ApplicationGenerator,
    /// Also fixes where run history lives (`<root>/.jobscout/`).
    pub writer: OutputWriter,
    pub notifier: Arc<dyn Notifier>,
}
