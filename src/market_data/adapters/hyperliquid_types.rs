use serde_json::Value;

// Source: POST https://api.hyperliquid.xyz/info { "type": "metaAndAssetCtxs" }
// Response is a 2-tuple: [PerpMeta, [AssetCtx, ...]], zipped by index.
// Entries stay raw here so one malformed asset cannot sink the whole payload.
#[derive(Debug, serde::Deserialize)]
pub struct MetaAndAssetCtxs(pub PerpMeta, pub Vec<Value>);

#[derive(Debug, serde::Deserialize)]
pub struct PerpMeta {
    pub universe: Vec<Value>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpAsset {
    pub name: String, // e.g. "BTC"
    #[serde(default)]
    pub is_delisted: Option<bool>,
}

#[derive(Debug, serde::Deserialize)]
pub struct AssetCtx {
    #[serde(default)]
    pub funding: Option<String>, // hourly fractional rate, e.g. "0.0000125"
}
