//! Commentary that never fails.

use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use super::{simulated_analysis, CommentarySource, ANALYSIS_EMPTY, ANALYSIS_UNAVAILABLE};
use crate::types::Sourced;

pub struct FallbackCommentary {
    primary: Option<Arc<dyn CommentarySource>>,
    latency: Duration,
}

impl FallbackCommentary {
    pub fn new(primary: Option<Arc<dyn CommentarySource>>) -> Self {
        Self {
            primary,
            latency: Duration::ZERO,
        }
    }

    pub fn simulated() -> Self {
        Self::new(None)
    }

    /// Delay canned responses by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn is_live(&self) -> bool {
        self.primary.is_some()
    }

    /// Commentary for `symbol`.
    ///
    /// Without a model this is the canned analysis. A failed model call
    /// yields a short apology instead.
    pub async fn analyze(&self, symbol: &str, price_summary: &str) -> Sourced<String> {
        let Some(primary) = &self.primary else {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            return Sourced::simulated(simulated_analysis(symbol));
        };

        match primary.analyze(symbol, price_summary).await {
            Ok(text) if text.trim().is_empty() => Sourced::live(ANALYSIS_EMPTY.to_string()),
            Ok(text) => Sourced::live(text),
            Err(e) => {
                error!(source = primary.id(), symbol, error = %e, "Commentary request failed");
                Sourced::simulated(ANALYSIS_UNAVAILABLE.to_string())
            }
        }
    }
}
