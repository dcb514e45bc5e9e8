//! Asset icon and block explorer links.

pub const ASSET: &str = "https://assets.terrarebels.net/icon";
pub const FINDER: &str = "https://finder.terrarebels.net";

/// How an icon should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Svg,
    Raster,
}

/// Icon location for an asset. An explicit `uri` wins over the name lookup;
/// `None` means the caller shows the default Terra logo.
pub fn asset_icon_url(name: Option<&str>, uri: Option<&str>, is_classic: bool) -> Option<String> {
    if let Some(uri) = uri.filter(|u| !u.is_empty()) {
        return Some(uri.to_string());
    }

    let name = name.filter(|n| !n.is_empty())?;
    if !is_classic && name == "Luna" {
        Some(format!("{}/svg/LUNA.png", ASSET))
    } else {
        Some(format!("{}/60/{}.png", ASSET, name))
    }
}

pub fn icon_kind(url: &str) -> IconKind {
    if url.contains(".svg") {
        IconKind::Svg
    } else {
        IconKind::Raster
    }
}

/// What a finder link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinderQuery {
    Tx,
    Address,
    Validator,
    Block,
}

impl FinderQuery {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinderQuery::Tx => "tx",
            FinderQuery::Address => "address",
            FinderQuery::Validator => "validator",
            FinderQuery::Block => "blocks",
        }
    }
}

/// Explorer link; `network` overrides the chain id in the path
pub fn finder_url(chain_id: &str, network: Option<&str>, q: FinderQuery, v: &str) -> String {
    format!("{}/{}/{}/{}", FINDER, network.unwrap_or(chain_id), q.as_str(), v)
}
