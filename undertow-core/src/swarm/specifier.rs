//! Torrent identification for newly created swarm sessions

use std::str::FromStr;

use super::{InfoHash, SwarmError};

/// Magnet link components.
///
/// Parsed magnet URI containing minimal torrent metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

/// Identifies the torrent a new swarm session should download.
#[derive(Debug, Clone, PartialEq)]
pub enum TorrentSpecifier {
    Magnet(MagnetLink),
    InfoHash(InfoHash),
}

impl TorrentSpecifier {
    /// Info hash of the torrent, whichever form it was given in.
    pub fn info_hash(&self) -> InfoHash {
        match self {
            TorrentSpecifier::Magnet(link) => link.info_hash,
            TorrentSpecifier::InfoHash(info_hash) => *info_hash,
        }
    }

    /// Parses a magnet URI.
    ///
    /// # Errors
    /// - `SwarmError::InvalidSpecifier` - Malformed URI or missing btih topic
    pub fn parse_magnet(magnet_uri: &str) -> Result<Self, SwarmError> {
        let magnet =
            magnet_url::Magnet::new(magnet_uri).map_err(|e| SwarmError::InvalidSpecifier {
                reason: format!("Invalid magnet link: {e}"),
            })?;

        let info_hash = extract_btih(magnet_uri)?;

        Ok(TorrentSpecifier::Magnet(MagnetLink {
            info_hash,
            display_name: magnet.display_name().map(|s| s.to_string()),
            trackers: magnet.trackers().to_vec(),
        }))
    }
}

impl FromStr for TorrentSpecifier {
    type Err = SwarmError;

    /// Accepts either a magnet URI or a bare 40 character hex info hash.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.starts_with("magnet:") {
            Self::parse_magnet(input)
        } else {
            InfoHash::from_hex(input).map(TorrentSpecifier::InfoHash)
        }
    }
}

/// Finds the `xt=urn:btih:` exact topic in the query string.
fn extract_btih(magnet_uri: &str) -> Result<InfoHash, SwarmError> {
    let query = magnet_uri.split_once('?').map(|(_, q)| q).unwrap_or("");

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .ok_or_else(|| SwarmError::InvalidSpecifier {
            reason: format!("Missing info hash in magnet link: {magnet_uri}"),
        })
        .and_then(InfoHash::from_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_bare_info_hash() {
        let spec: TorrentSpecifier = HASH.parse().unwrap();
        assert_eq!(spec, TorrentSpecifier::InfoHash(InfoHash::from_hex(HASH).unwrap()));
    }

    #[test]
    fn test_parse_magnet_link() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}&dn=catalog.db");
        let spec: TorrentSpecifier = uri.parse().unwrap();

        assert_eq!(spec.info_hash().to_string(), HASH);
        match spec {
            TorrentSpecifier::Magnet(link) => {
                assert_eq!(link.display_name.as_deref(), Some("catalog.db"));
            }
            other => panic!("expected magnet specifier, got {other:?}"),
        }
    }

    #[test]
    fn test_magnet_without_hash_rejected() {
        let result = "magnet:?dn=catalog.db".parse::<TorrentSpecifier>();
        assert!(matches!(result, Err(SwarmError::InvalidSpecifier { .. })));
    }
}
