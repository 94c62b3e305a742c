use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 subnet in CIDR notation. Host bits in the base address are masked
/// off on parse, so `192.168.1.5/24` means `192.168.1.0/24`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

#[derive(Debug)]
pub struct SubnetParseError(String);

impl std::fmt::Display for SubnetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid subnet: {}", self.0)
    }
}

impl std::error::Error for SubnetParseError {}

impl FromStr for Subnet {
    type Err = SubnetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = match s.split_once('/') {
            Some(parts) => parts,
            None => (s, "32"),
        };
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| SubnetParseError(s.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| SubnetParseError(s.to_string()))?;
        if prefix > 32 {
            return Err(SubnetParseError(s.to_string()));
        }
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        };
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix,
        })
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl Subnet {
    /// Usable host addresses: network and broadcast addresses are excluded.
    /// `/31` yields both addresses and `/32` yields the single address.
    ///
    /// The math runs in u64 so subnets at the top of the IPv4 range and the
    /// `/0` default route enumerate without wrapping. Lazy, since `/0` spans
    /// four billion addresses.
    pub fn hosts(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> {
        let base = u64::from(u32::from(self.network));
        let (start, end) = match self.prefix {
            32 => (base, base + 1),
            31 => (base, base + 2),
            _ => {
                let size = 1u64 << (32 - self.prefix);
                (base + 1, base + size - 1)
            }
        };
        (start..end).map(|addr| Ipv4Addr::from(addr as u32))
    }

    pub fn host_count(&self) -> u64 {
        match self.prefix {
            32 => 1,
            31 => 2,
            _ => (1u64 << (32 - self.prefix)) - 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cidr() {
        let s: Subnet = "192.168.1.0/24".parse().unwrap();
        assert_eq!(s.to_string(), "192.168.1.0/24");
        assert_eq!(s.host_count(), 254);
    }

    #[test]
    fn masks_host_bits() {
        let s: Subnet = "192.168.1.5/24".parse().unwrap();
        assert_eq!(s.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn slash_30_has_two_usable_hosts() {
        let s: Subnet = "192.168.1.0/30".parse().unwrap();
        assert_eq!(
            s.hosts().collect::<Vec<_>>(),
            vec![
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::new(192, 168, 1, 2)
            ]
        );
    }

    #[test]
    fn slash_31_and_32_edge_cases() {
        let s: Subnet = "10.0.0.0/31".parse().unwrap();
        assert_eq!(s.hosts().count(), 2);

        let s: Subnet = "10.0.0.7/32".parse().unwrap();
        assert_eq!(
            s.hosts().collect::<Vec<_>>(),
            vec![Ipv4Addr::new(10, 0, 0, 7)]
        );
    }

    #[test]
    fn bare_address_is_slash_32() {
        let s: Subnet = "10.1.2.3".parse().unwrap();
        assert_eq!(s.hosts().count(), 1);
    }

    #[test]
    fn top_of_range_subnet_enumerates() {
        let s: Subnet = "255.255.255.0/24".parse().unwrap();
        let hosts: Vec<_> = s.hosts().collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(255, 255, 255, 1));
        assert_eq!(*hosts.last().unwrap(), Ipv4Addr::new(255, 255, 255, 254));
    }

    #[test]
    fn top_of_range_slash_31_includes_broadcast_address() {
        let s: Subnet = "255.255.255.254/31".parse().unwrap();
        assert_eq!(
            s.hosts().collect::<Vec<_>>(),
            vec![
                Ipv4Addr::new(255, 255, 255, 254),
                Ipv4Addr::new(255, 255, 255, 255)
            ]
        );
    }

    #[test]
    fn default_route_spans_the_whole_range() {
        let s: Subnet = "0.0.0.0/0".parse().unwrap();
        assert_eq!(s.host_count(), 4_294_967_294);
        let mut hosts = s.hosts();
        assert_eq!(hosts.next(), Some(Ipv4Addr::new(0, 0, 0, 1)));
        assert_eq!(hosts.next_back(), Some(Ipv4Addr::new(255, 255, 255, 254)));
    }

    #[test]
    fn rejects_malformed() {
        assert!("not-a-subnet".parse::<Subnet>().is_err());
        assert!("192.168.1.0/33".parse::<Subnet>().is_err());
        assert!("192.168.1/24".parse::<Subnet>().is_err());
    }
}
