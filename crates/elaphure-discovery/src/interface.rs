//! Local interface enumeration and directed-broadcast target computation

use pnet::datalink;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{debug, trace};

use crate::scanner::DiscoveryError;

/// Interface name prefixes treated as virtual tunnels
const TUNNEL_PREFIXES: &[&str] = &["tun", "wg", "ppp", "utun", "ipsec"];

/// IPv4 address assigned to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub ip: Ipv4Addr,
    /// Subnet mask, when the platform reports one
    pub netmask: Option<Ipv4Addr>,
}

/// Snapshot of one local network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
    pub is_point_to_point: bool,
    pub ipv4: Vec<InterfaceAddr>,
}

impl InterfaceInfo {
    /// Whether this looks like a VPN or other virtual tunnel
    pub fn is_tunnel(&self) -> bool {
        self.is_point_to_point || TUNNEL_PREFIXES.iter().any(|p| self.name.starts_with(p))
    }

    /// Up, not loopback, not a tunnel, and at least one IPv4 address with a mask
    pub fn is_eligible(&self) -> bool {
        self.is_up
            && !self.is_loopback
            && !self.is_tunnel()
            && self.ipv4.iter().any(|a| a.netmask.is_some())
    }
}

/// Source of the local interface list.
///
/// The scanner asks this once per scan, so implementations should not cache.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, DiscoveryError>;
}

/// Interfaces reported by the operating system.
///
/// Addresses and netmasks come from `network-interface`, which reports
/// enumeration failures; link flags come from pnet, matched by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, DiscoveryError> {
        use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};

        let listed = NetworkInterface::show().map(|ifaces| -> Vec<(String, Vec<InterfaceAddr>)> {
            ifaces
                .into_iter()
                .map(|iface| {
                    let addrs: Vec<InterfaceAddr> = iface
                        .addr
                        .iter()
                        .filter_map(|addr| match addr {
                            Addr::V4(v4) => Some(InterfaceAddr {
                                ip: v4.ip,
                                netmask: v4.netmask,
                            }),
                            Addr::V6(_) => None,
                        })
                        .collect();
                    (iface.name, addrs)
                })
                .collect()
        });

        let flags: HashMap<String, LinkFlags> = datalink::interfaces()
            .into_iter()
            .map(|iface| {
                let flags = LinkFlags {
                    is_up: iface.is_up(),
                    is_loopback: iface.is_loopback(),
                    is_point_to_point: iface.is_point_to_point(),
                };
                (iface.name, flags)
            })
            .collect();

        let interfaces = merge_interfaces(listed, &flags)?;
        debug!("Found {} local interfaces", interfaces.len());
        Ok(interfaces)
    }
}

/// Link state of an interface as reported by the datalink layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    pub is_up: bool,
    pub is_loopback: bool,
    pub is_point_to_point: bool,
}

/// Combine an address listing with link flags.
///
/// Entries sharing a name are folded into one interface, keeping first-seen
/// order. An interface without flags is treated as down. A failed listing is
/// an error rather than an empty result.
pub fn merge_interfaces<E: std::fmt::Display>(
    listed: Result<Vec<(String, Vec<InterfaceAddr>)>, E>,
    flags: &HashMap<String, LinkFlags>,
) -> Result<Vec<InterfaceInfo>, DiscoveryError> {
    let listed = listed.map_err(|e| DiscoveryError::Interfaces(e.to_string()))?;

    let mut interfaces: Vec<InterfaceInfo> = Vec::new();
    for (name, addrs) in listed {
        if let Some(existing) = interfaces.iter_mut().find(|i| i.name == name) {
            for addr in addrs {
                if !existing.ipv4.contains(&addr) {
                    existing.ipv4.push(addr);
                }
            }
            continue;
        }

        let link = match flags.get(&name) {
            Some(link) => *link,
            None => {
                trace!(interface = %name, "No link flags, treating as down");
                LinkFlags::default()
            }
        };
        interfaces.push(InterfaceInfo {
            name,
            is_up: link.is_up,
            is_loopback: link.is_loopback,
            is_point_to_point: link.is_point_to_point,
            ipv4: addrs,
        });
    }

    Ok(interfaces)
}

/// Directed broadcast address of the subnet `ip` lives in
pub fn broadcast_address(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

/// Compute the probe targets for every eligible interface address.
///
/// Targets keep interface order; a broadcast address shared by several
/// addresses appears only once.
pub fn broadcast_targets(interfaces: &[InterfaceInfo], port: u16) -> Vec<SocketAddrV4> {
    let mut targets: Vec<SocketAddrV4> = Vec::new();

    for iface in interfaces {
        if !iface.is_eligible() {
            trace!(interface = %iface.name, "Skipping interface");
            continue;
        }

        for addr in &iface.ipv4 {
            let Some(mask) = addr.netmask else {
                continue;
            };
            let target = SocketAddrV4::new(broadcast_address(addr.ip, mask), port);
            if !targets.contains(&target) {
                debug!(interface = %iface.name, ip = %addr.ip, target = %target, "Broadcast target");
                targets.push(target);
            }
        }
    }

    targets
}
