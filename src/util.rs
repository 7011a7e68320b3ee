use std::collections::BTreeMap;
use std::ops::Range;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::types::NodeId;

/// Installs the fmt subscriber. `RUST_LOG` overrides `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// Parses `<id>=<host:port>`.
pub fn parse_peer(entry: &str) -> Result<(NodeId, String), String> {
    let (id, address) = entry
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<host:port>, got {entry:?}"))?;
    let id = id.trim().parse::<NodeId>().map_err(|err| format!("bad node id {id:?}: {err}"))?;
    let address = address.trim();
    if address.is_empty() {
        return Err(format!("empty address for node {id}"));
    }
    Ok((id, address.to_string()))
}

pub fn peer_table(entries: &[(NodeId, String)]) -> BTreeMap<NodeId, String> {
    entries.iter().cloned().collect()
}

/// Parses `<min>..<max>` in milliseconds, or a single value for a fixed interval.
pub fn parse_interval(value: &str) -> Result<Range<Duration>, String> {
    let millis = |raw: &str| {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|err| format!("bad milliseconds {raw:?}: {err}"))
    };

    match value.split_once("..") {
        Some((start, end)) => {
            let range = millis(start)?..millis(end)?;
            if range.start > range.end {
                return Err(format!("interval {value:?} is reversed"));
            }
            Ok(range)
        }
        None => {
            let fixed = millis(value)?;
            Ok(fixed..fixed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers() {
        assert_eq!(parse_peer("3=peer-3:80"), Ok((3, "peer-3:80".to_string())));
        assert_eq!(parse_peer(" 7 = 127.0.0.1:9000 "), Ok((7, "127.0.0.1:9000".to_string())));
        assert!(parse_peer("peer-3:80").is_err());
        assert!(parse_peer("x=peer-3:80").is_err());
        assert!(parse_peer("3=").is_err());
    }

    #[test]
    fn intervals() {
        assert_eq!(
            parse_interval("1000..11000"),
            Ok(Duration::from_secs(1)..Duration::from_secs(11))
        );
        assert_eq!(
            parse_interval("500"),
            Ok(Duration::from_millis(500)..Duration::from_millis(500))
        );
        assert!(parse_interval("9..3").is_err());
        assert!(parse_interval("a..3").is_err());
    }
}
