//! FidoNet-style node addresses (`zone:net/node.point@domain`).

/// A parsed FTN address.
///
/// # Examples
/// - `"2:5020/1042"` → zone 2, net 5020, node 1042, point 0
/// - `"1:261/38.5@fidonet"` → point 5, domain `"fidonet"`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FidoAddress {
    pub zone: u16,
    pub net: u16,
    pub node: u16,
    pub point: u16,
    /// Optional domain suffix (empty when absent).
    pub domain: String,
}

impl FidoAddress {
    /// Parse an address. Returns `None` unless zone, net and node are present.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (addr, domain) = match trimmed.split_once('@') {
            Some((a, d)) => (a, d.trim().to_string()),
            None => (trimmed, String::new()),
        };

        let (zone, rest) = addr.split_once(':')?;
        let (net, rest) = rest.split_once('/')?;
        let (node, point) = match rest.split_once('.') {
            Some((n, p)) => (n, p),
            None => (rest, "0"),
        };

        Some(Self {
            zone: zone.trim().parse().ok()?,
            net: net.trim().parse().ok()?,
            node: node.trim().parse().ok()?,
            point: point.trim().parse().ok()?,
            domain,
        })
    }

    /// `true` for a point address.
    pub fn is_point(&self) -> bool {
        self.point != 0
    }
}

impl std::fmt::Display for FidoAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.zone, self.net, self.node)?;
        if self.point != 0 {
            write!(f, ".{}", self.point)?;
        }
        if !self.domain.is_empty() {
            write!(f, "@{}", self.domain)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node() {
        let a = FidoAddress::parse("2:5020/1042").unwrap();
        assert_eq!((a.zone, a.net, a.node, a.point), (2, 5020, 1042, 0));
        assert!(!a.is_point());
        assert_eq!(a.to_string(), "2:5020/1042");
    }

    #[test]
    fn test_parse_point_with_domain() {
        let a = FidoAddress::parse(" 1:261/38.5@fidonet ").unwrap();
        assert_eq!(a.point, 5);
        assert_eq!(a.domain, "fidonet");
        assert_eq!(a.to_string(), "1:261/38.5@fidonet");
    }

    #[test]
    fn test_parse_rejects_partial() {
        assert!(FidoAddress::parse("261/38").is_none());
        assert!(FidoAddress::parse("1:261").is_none());
        assert!(FidoAddress::parse("x:261/38").is_none());
        assert!(FidoAddress::parse("").is_none());
    }
}
