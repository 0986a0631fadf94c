use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use shared::types::RawService;
use super::{Discovery, DiscoveryBatch};

/// Discovery backend replaying a fixed set of services, delivered once on
/// every start. Stands in for the network in demo mode and tests.
pub struct FixtureDiscovery {
    services: DiscoveryBatch,
    tx: mpsc::Sender<DiscoveryBatch>,
    running: bool,
}

impl FixtureDiscovery {
    pub fn new(services: DiscoveryBatch, tx: mpsc::Sender<DiscoveryBatch>) -> Self {
        Self { services, tx, running: false }
    }

    /// A small home network
    pub fn demo(tx: mpsc::Sender<DiscoveryBatch>) -> Self {
        Self::new(demo_services(), tx)
    }
}

impl Discovery for FixtureDiscovery {
    fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        if let Err(e) = self.tx.try_send(self.services.clone()) {
            tracing::warn!("Failed to deliver fixture batch: {}", e);
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.running = false;
        tracing::debug!("Fixture discovery reset");
    }
}

fn service(
    name: &str,
    service_type: &str,
    hostname: &str,
    addresses: &[&str],
    port: u16,
    txt: &[(&str, &str)],
) -> RawService {
    RawService {
        name: name.to_string(),
        service_type: service_type.to_string(),
        domain: Some("local".to_string()),
        hostname: Some(hostname.to_string()),
        addresses: addresses.iter().map(|a| a.to_string()).collect::<BTreeSet<_>>(),
        port,
        txt: txt
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// The studio Mac advertises its IPv4 address on one service and its IPv6
/// address on another; the third service carries both and joins them.
pub fn demo_services() -> DiscoveryBatch {
    vec![
        service("Studio", "_ssh._tcp", "studio.local.", &["192.168.1.20"], 22, &[]),
        service("Studio", "_smb._tcp", "studio.local.", &["fd7a:1b2c::20"], 445, &[]),
        service(
            "Studio",
            "_airplay._tcp",
            "studio.local.",
            &["192.168.1.20", "fd7a:1b2c::20"],
            7000,
            &[("model", "Mac14,3")],
        ),
        service(
            "LaserJet M404 @ Studio",
            "_ipp._tcp",
            "studio.local.",
            &["192.168.1.20"],
            631,
            &[],
        ),
        service(
            "Chromecast-7f3e9a",
            "_googlecast._tcp",
            "7f3e9a.local.",
            &["192.168.1.31"],
            8009,
            &[("fn", "Living Room"), ("md", "Chromecast")],
        ),
        service("RINCON_48A6B8C0FFEE01400", "_sonos._tcp", "sonos-kitchen.local.", &["192.168.1.44"], 1443, &[]),
        service(
            "Home",
            "_home-assistant._tcp",
            "homeassistant.local.",
            &["192.168.1.10"],
            8123,
            &[("location_name", "Cabin")],
        ),
        service(
            "Synology DS920",
            "_http._tcp",
            "nas.local.",
            &["192.168.1.5"],
            5000,
            &[("path", "/webman")],
        ),
    ]
}
