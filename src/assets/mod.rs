use alloy::primitives::utils::format_units;
use alloy::primitives::U256;
use std::collections::HashMap;
use std::str::FromStr;

/// Display metadata for a fungible asset, plus the yield-bearing pool its
/// escrowed balance may be swept into.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub yield_pool: Option<String>,
}

/// Pure lookup table from asset address to display metadata. Unknown assets
/// degrade to a truncated-address symbol with 18 decimals rather than failing
/// the read.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    by_address: HashMap<String, AssetInfo>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the assets the escrow contracts are deployed
    /// against, extended from the `ASSET_REGISTRY` env var.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        registry.insert(AssetInfo {
            address: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".into(),
            symbol: "USDC".into(),
            decimals: 6,
            yield_pool: Some("0x4e65fe4dba92790696d040ac24aa414708f5c0ab".into()),
        });
        registry.insert(AssetInfo {
            address: "0x4200000000000000000000000000000000000006".into(),
            symbol: "WETH".into(),
            decimals: 18,
            yield_pool: None,
        });

        // ASSET_REGISTRY=0xaddr:SYM:decimals[:pool],0xaddr2:SYM2:18
        if let Ok(raw) = std::env::var("ASSET_REGISTRY") {
            for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match Self::parse_entry(entry) {
                    Some(info) => registry.insert(info),
                    None => tracing::warn!(entry, "Ignoring malformed ASSET_REGISTRY entry"),
                }
            }
        }

        registry
    }

    fn parse_entry(entry: &str) -> Option<AssetInfo> {
        let mut parts = entry.split(':');
        let address = parts.next()?.to_lowercase();
        let symbol = parts.next()?.to_string();
        let decimals: u8 = parts.next()?.parse().ok()?;
        let yield_pool = parts.next().map(|p| p.to_lowercase());
        if !address.starts_with("0x") || symbol.is_empty() {
            return None;
        }
        Some(AssetInfo {
            address,
            symbol,
            decimals,
            yield_pool,
        })
    }

    pub fn insert(&mut self, info: AssetInfo) {
        self.by_address.insert(info.address.to_lowercase(), info);
    }

    /// Look up an asset, falling back to placeholder metadata for addresses
    /// the registry has never seen.
    pub fn resolve(&self, address: &str) -> AssetInfo {
        let key = address.to_lowercase();
        self.by_address.get(&key).cloned().unwrap_or_else(|| AssetInfo {
            symbol: short_symbol(&key),
            address: key,
            decimals: 18,
            yield_pool: None,
        })
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// Human-scale rendering of a base-unit amount, e.g. "1500000" at 6 decimals
/// becomes "1.500000". Falls back to the raw decimal string when the amount
/// does not parse, rather than failing the query.
pub fn display_amount(base_units: &str, decimals: u8) -> String {
    match U256::from_str(base_units) {
        Ok(value) => format_units(value, decimals).unwrap_or_else(|_| base_units.to_string()),
        Err(_) => base_units.to_string(),
    }
}

fn short_symbol(address: &str) -> String {
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
