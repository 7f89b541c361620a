//! Device identifier templates

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use iotsc_core::Service;
use tracing::{debug, warn};

/// Placeholder replaced with the host's current IP address
pub const IP_PLACEHOLDER: &str = "%IP";

pub fn is_template(device_id: &str) -> bool {
    device_id.contains(IP_PLACEHOLDER)
}

/// Replace every placeholder in `template` with `ip`, or `0.0.0.0` when unknown
pub fn expand(template: &str, ip: Option<IpAddr>) -> String {
    let ip = ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    template.replace(IP_PLACEHOLDER, &ip.to_string())
}

/// Resolve `template` against the current network configuration
pub fn resolve(template: &str) -> String {
    if !is_template(template) {
        return template.to_string();
    }

    let ip = current_ip();
    if ip.is_none() {
        warn!("No IP address available for device id '{}'", template);
    }
    expand(template, ip)
}

/// Address of the interface carrying the default route.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn current_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    if let Err(e) = socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)) {
        debug!("No route for IP lookup: {}", e);
        return None;
    }
    socket
        .local_addr()
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| !ip.is_unspecified())
}

/// Re-resolve `template` and publish the result if the address changed
pub fn refresh(template: &str, service: &Service) {
    if !is_template(template) {
        return;
    }

    let device_id = resolve(template);
    if device_id != service.device_id() {
        service.set_device_id(device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotsc_core::Role;

    #[test]
    fn test_expand_placeholder() {
        let ip = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(expand("hub-%IP", ip), "hub-10.0.0.7");
        assert_eq!(expand("%IP/%IP", ip), "10.0.0.7/10.0.0.7");
    }

    #[test]
    fn test_expand_without_address() {
        assert_eq!(expand("hub-%IP", None), "hub-0.0.0.0");
    }

    #[test]
    fn test_plain_id_untouched() {
        assert!(!is_template("node-17"));
        assert_eq!(resolve("node-17"), "node-17");
    }

    #[test]
    fn test_refresh_ignores_plain_id() {
        let service = Service::new(0, Role::Sender, "node-17");
        service.set_device_id("changed-by-peer");
        refresh("node-17", &service);
        assert_eq!(service.device_id(), "changed-by-peer");
    }

    #[test]
    fn test_refresh_resolves_template() {
        let service = Service::new(0, Role::Sender, "stale");
        refresh("hub-%IP", &service);
        let device_id = service.device_id();
        assert!(device_id.starts_with("hub-"));
        assert!(!device_id.contains(IP_PLACEHOLDER));
    }
}
