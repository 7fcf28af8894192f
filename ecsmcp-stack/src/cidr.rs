//! Subnet CIDR planning
//!
//! The VPC block is split into the smallest power-of-two number of equal
//! blocks that holds every subnet. Blocks are handed out in order.

use std::net::Ipv4Addr;

use ecsmcp_core::schema::validate_cidr;

use crate::error::StackError;

/// Smallest subnet the provider accepts
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// Split `cidr` into `count` equal subnets
pub fn split(cidr: &str, count: usize) -> Result<Vec<String>, StackError> {
    validate_cidr(cidr).map_err(|reason| StackError::InvalidCidr {
        cidr: cidr.to_string(),
        reason,
    })?;
    let (address, prefix) = parse(cidr)?;

    let bits = count.max(1).next_power_of_two().trailing_zeros() as u8;
    let new_prefix = prefix + bits;
    if new_prefix > MAX_SUBNET_PREFIX {
        return Err(StackError::CidrTooSmall {
            cidr: cidr.to_string(),
            count,
            max_prefix: MAX_SUBNET_PREFIX,
        });
    }

    let size = 1u64 << (32 - new_prefix);
    let base = u64::from(u32::from(address));
    Ok((0..count as u64)
        .map(|i| {
            let start = Ipv4Addr::from((base + i * size) as u32);
            format!("{}/{}", start, new_prefix)
        })
        .collect())
}

fn parse(cidr: &str) -> Result<(Ipv4Addr, u8), StackError> {
    let invalid = |reason: &str| StackError::InvalidCidr {
        cidr: cidr.to_string(),
        reason: reason.to_string(),
    };
    let (ip, prefix) = cidr.split_once('/').ok_or_else(|| invalid("expected IP/prefix"))?;
    let address = ip.parse().map_err(|_| invalid("invalid address"))?;
    let prefix = prefix.parse().map_err(|_| invalid("invalid prefix"))?;
    Ok((address, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_subnets_of_a_16_are_20s() {
        let blocks = split("192.168.0.0/16", 9).unwrap();
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[0], "192.168.0.0/20");
        assert_eq!(blocks[1], "192.168.16.0/20");
        assert_eq!(blocks[8], "192.168.128.0/20");
    }

    #[test]
    fn exact_power_of_two() {
        let blocks = split("10.0.0.0/16", 4).unwrap();
        assert_eq!(
            blocks,
            vec!["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18", "10.0.192.0/18"]
        );
    }

    #[test]
    fn smallest_allowed_block() {
        let blocks = split("10.0.0.0/24", 9).unwrap();
        assert_eq!(blocks[8], "10.0.0.128/28");
    }

    #[test]
    fn too_small_vpc_is_rejected() {
        assert!(matches!(
            split("10.0.0.0/25", 9),
            Err(StackError::CidrTooSmall { max_prefix: 28, .. })
        ));
    }

    #[test]
    fn malformed_cidr_is_rejected() {
        assert!(matches!(split("10.0.0.0", 9), Err(StackError::InvalidCidr { .. })));
        assert!(matches!(split("10.0.0.1/16", 9), Err(StackError::InvalidCidr { .. })));
        assert!(matches!(split("300.0.0.0/16", 9), Err(StackError::InvalidCidr { .. })));
    }
}
