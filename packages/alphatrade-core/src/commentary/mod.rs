//! AI commentary module.
//!
//! [`GeminiClient`] asks a Gemini model for a short analysis of a symbol.
//! [`FallbackCommentary`] makes sure a caller always gets text back.

mod fallback;
mod gemini;

use async_trait::async_trait;

use crate::Unavailable;

pub use fallback::FallbackCommentary;
pub use gemini::GeminiClient;

/// Canned analysis served when no model is configured.
pub const SIMULATED_ANALYSIS: &str = "[Simulated analysis]

Summary:
{symbol} is in a firm uptrend. MACD is showing a buy signal and RSI sits \
around 60, a healthy range short of overbought.

Recommendation:
1. Short term: consider scaling in on pullbacks toward the 5-day moving average.
2. Long term: fundamentals look steady and suit a long holding period; a target \
about 10% above a breakout of the recent high is reasonable.
3. Risks: watch next week's earnings release and the central bank rate decision, \
either of which may bring short-term volatility.";

/// Served when the model call fails.
pub const ANALYSIS_UNAVAILABLE: &str =
    "AI analysis is temporarily unavailable. Please try again later.";

/// Served when the model answers with no text.
pub const ANALYSIS_EMPTY: &str = "Unable to generate an analysis.";

/// A text-completion service producing commentary.
#[async_trait]
pub trait CommentarySource: Send + Sync {
    fn id(&self) -> &'static str;

    async fn analyze(&self, symbol: &str, price_summary: &str) -> Result<String, Unavailable>;
}

/// Build the analysis prompt for `symbol`.
pub fn analysis_prompt(symbol: &str, price_summary: &str) -> String {
    format!(
        "You are a professional Wall Street financial analyst. \
Analyze the recent price movement of the stock {symbol}.
Current price summary: {price_summary}

Reply in plain text without markdown, in clearly separated paragraphs:
1. Market summary
2. Technical analysis
3. Recommendation (buy / sell / hold) with risk notes

Keep it under 200 words, professional and objective."
    )
}

/// Canned analysis with the symbol filled in.
pub fn simulated_analysis(symbol: &str) -> String {
    SIMULATED_ANALYSIS.replace("{symbol}", symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = analysis_prompt("TSLA", "Price: 250.00, Change: -3.10 (-1.22%)");
        assert!(prompt.contains("TSLA"));
        assert!(prompt.contains("Price: 250.00, Change: -3.10 (-1.22%)"));
        assert!(prompt.contains("200 words"));
    }

    #[test]
    fn test_simulated_analysis_names_symbol() {
        let text = simulated_analysis("NVDA");
        assert!(text.contains("NVDA is in a firm uptrend"));
        assert!(!text.contains("{symbol}"));
    }
}
