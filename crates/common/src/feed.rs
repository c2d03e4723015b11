use async_trait::async_trait;

use crate::{Result, TokenPrice, TokenQuote};

/// Abstraction over the token price provider.
///
/// `MoralisClient` implements this against the Moralis EVM API. Tests supply
/// deterministic fakes. Every failure is reported as `Error::FeedUnavailable`.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Quote a batch of tokens on one network. The batch either succeeds as
    /// a whole or fails as a whole.
    async fn fetch_multiple_prices(
        &self,
        chain: &str,
        token_addresses: &[String],
    ) -> Result<Vec<TokenQuote>>;

    /// Quote a single token.
    async fn fetch_single_price(&self, chain: &str, token_address: &str) -> Result<TokenPrice>;
}
