//! Adapter implementations for the external services the reconciler
//! consumes: launchpad index, DEX aggregator, chain RPC and the price
//! ticker oracle.

pub mod chain;
pub mod cli;
pub mod index;
pub mod market;
pub mod oracle;

pub(crate) mod de {
    //! Serde helpers for APIs that serve numbers either as JSON numbers
    //! or as decimal strings.

    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    /// `Option<f64>` accepting `12.5`, `"12.5"` or null/absent.
    pub fn flexible_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<NumOrStr>::deserialize(deserializer)?;
        Ok(value.and_then(|v| match v {
            NumOrStr::Num(n) => Some(n),
            NumOrStr::Str(s) => s.trim().parse().ok(),
        }))
    }
}
