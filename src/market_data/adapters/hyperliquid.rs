// Hyperliquid perps, listed as the "Based" venue.
// One REST call returns the universe and per-asset contexts side by side.

use std::time::Duration;

use tracing::{debug, instrument};

use super::hyperliquid_types::{AssetCtx, MetaAndAssetCtxs, PerpAsset};
use super::{http_client, PollAdapter};
use crate::engine::types::{RateRecord, Venue};
use crate::error::{AdapterError, AdapterResult};
use crate::market_data::normaliser::{canonical_symbol, percent_from_fraction};

pub struct HyperliquidAdapter {
    pub info_url: String, // "https://api.hyperliquid.xyz/info"
    client: reqwest::Client,
}

impl HyperliquidAdapter {
    pub fn new(info_url: &str, timeout: Duration) -> Self {
        Self { info_url: info_url.to_string(), client: http_client(timeout) }
    }
}

/// Zip universe with asset contexts. Hyperliquid funding is hourly; the rate
/// is reported as-is (x100), with no interval rescaling.
pub fn parse_meta_and_asset_ctxs(body: &str) -> AdapterResult<Vec<RateRecord>> {
    let MetaAndAssetCtxs(meta, ctxs) = serde_json::from_str(body)?;
    if meta.universe.len() != ctxs.len() {
        debug!(
            universe = meta.universe.len(),
            ctxs = ctxs.len(),
            "universe and asset ctx lengths differ, zipping the common prefix"
        );
    }

    // Decoded per index so the pairing survives a skipped entry.
    let records = meta
        .universe
        .into_iter()
        .zip(ctxs)
        .filter_map(|(asset, ctx)| {
            let asset: PerpAsset = serde_json::from_value(asset).ok()?;
            let ctx: AssetCtx = serde_json::from_value(ctx).ok()?;
            if asset.is_delisted.unwrap_or(false) {
                return None;
            }
            let symbol = canonical_symbol(&asset.name)?;
            let rate = percent_from_fraction(ctx.funding.as_deref()?)?;
            Some(RateRecord::new(symbol, Venue::Based, rate))
        })
        .collect();
    Ok(records)
}

#[async_trait::async_trait]
impl PollAdapter for HyperliquidAdapter {
    fn venue(&self) -> Venue {
        Venue::Based
    }

    #[instrument(level = "debug", skip(self), fields(venue = "Based"))]
    async fn try_fetch(&self) -> AdapterResult<Vec<RateRecord>> {
        let res = self
            .client
            .post(&self.info_url)
            .json(&serde_json::json!({"type": "metaAndAssetCtxs"}))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AdapterError::Status { venue: Venue::Based, status: res.status().as_u16() });
        }
        let body = res.text().await?;
        let records = parse_meta_and_asset_ctxs(&body)?;
        debug!(count = records.len(), "parsed metaAndAssetCtxs");
        Ok(records)
    }
}
