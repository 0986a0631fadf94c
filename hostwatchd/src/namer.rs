//! Display-name heuristics for hosts.
//!
//! Hosts are named after their most telling service. Tiers are tried in
//! order and the first tier with a matching service decides the name.
//! Within a tier the service with the smallest (name, type, domain, port)
//! wins.

use std::cmp::Ordering;
use shared::protocol::{
    TYPE_AIRPLAY, TYPE_AIRPORT, TYPE_GOOGLECAST, TYPE_HOME_ASSISTANT, TYPE_HOMEKIT,
    TYPE_HOSTWATCH, TYPE_IPP, TYPE_SLEEP_PROXY, TYPE_SMB, TYPE_SONOS, TYPE_SSH,
    TXT_FRIENDLY_NAME, TXT_LOCATION_NAME, TXT_MANUFACTURER, TXT_MODEL, TXT_MODEL_SHORT,
};
use crate::service::Service;

/// Returns `None` to fall back to the service's own name.
type Strategy = fn(&Service) -> Option<String>;

struct Tier {
    prefix: &'static str,
    strategy: Strategy,
}

const TIERS: &[Tier] = &[
    Tier { prefix: TYPE_AIRPLAY, strategy: screen_mirroring },
    Tier { prefix: TYPE_AIRPORT, strategy: plain },
    Tier { prefix: TYPE_SLEEP_PROXY, strategy: plain },
    Tier { prefix: TYPE_HOME_ASSISTANT, strategy: home_assistant },
    Tier { prefix: TYPE_HOMEKIT, strategy: homekit_accessory },
    Tier { prefix: TYPE_SSH, strategy: plain },
    Tier { prefix: TYPE_SMB, strategy: plain },
    Tier { prefix: TYPE_IPP, strategy: printer_share },
    Tier { prefix: TYPE_GOOGLECAST, strategy: cast_receiver },
    Tier { prefix: TYPE_HOSTWATCH, strategy: plain },
    Tier { prefix: TYPE_SONOS, strategy: sonos },
];

/// AirPlay model identifier prefixes and the product they belong to
const MODEL_FAMILIES: &[(&str, &str)] = &[
    ("AppleTV", "Apple TV"),
    ("AudioAccessory", "HomePod"),
    ("Mac", "Mac"),
];

const LOCAL_SUFFIXES: &[&str] = &[".local.", ".local"];

pub fn name_for(services: &[Service]) -> Option<String> {
    for tier in TIERS {
        let chosen = services
            .iter()
            .filter(|s| s.service_type.starts_with(tier.prefix))
            .min_by(|a, b| tie_break(a, b));

        if let Some(service) = chosen {
            return Some((tier.strategy)(service).unwrap_or_else(|| service.name.clone()));
        }
    }

    fallback(services)
}

fn tie_break(a: &Service, b: &Service) -> Ordering {
    a.name
        .cmp(&b.name)
        .then_with(|| a.service_type.cmp(&b.service_type))
        .then_with(|| a.domain.cmp(&b.domain))
        .then_with(|| a.port.cmp(&b.port))
}

/// Shorter of the first hostname (minus `.local.`) and the smallest service
/// name; the shorter one tends to be the pithier.
fn fallback(services: &[Service]) -> Option<String> {
    let service_name = services.iter().map(|s| s.name.as_str()).min()?;

    let hostname = services
        .iter()
        .flat_map(|s| s.cluster.hostnames().iter())
        .min()
        .map(|h| strip_local(h))
        .filter(|h| !h.is_empty());

    match hostname {
        Some(host) if host.chars().count() <= service_name.chars().count() => Some(host.to_string()),
        _ => Some(service_name.to_string()),
    }
}

fn strip_local(hostname: &str) -> &str {
    LOCAL_SUFFIXES
        .iter()
        .find_map(|suffix| hostname.strip_suffix(suffix))
        .unwrap_or(hostname)
}

fn plain(_: &Service) -> Option<String> {
    None
}

fn screen_mirroring(service: &Service) -> Option<String> {
    if let Some(manufacturer) = service.txt(TXT_MANUFACTURER) {
        return Some(format!("{} ({})", manufacturer, service.name));
    }

    let model = service.txt(TXT_MODEL)?;
    MODEL_FAMILIES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, product)| format!("{} ({})", product, service.name))
}

fn home_assistant(service: &Service) -> Option<String> {
    let location = service.txt(TXT_LOCATION_NAME).unwrap_or("New");
    Some(format!("Home Assistant ({})", location))
}

fn homekit_accessory(service: &Service) -> Option<String> {
    let model = service.txt(TXT_MODEL_SHORT).or_else(|| service.txt(TXT_MODEL))?;
    Some(format!("{} ({})", model, service.name))
}

/// Shared printers are advertised as "Printer @ Computer"
fn printer_share(service: &Service) -> Option<String> {
    service
        .name
        .split_once(" @ ")
        .map(|(_, computer)| computer.to_string())
}

fn cast_receiver(service: &Service) -> Option<String> {
    service.txt(TXT_FRIENDLY_NAME).map(str::to_string)
}

fn sonos(_: &Service) -> Option<String> {
    Some("Sonos".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use chrono::Utc;
    use shared::types::RawService;
    use crate::cluster::Registry;
    use crate::service::tests::raw;

    fn with_txt(mut raw: RawService, pairs: &[(&str, &str)]) -> RawService {
        for (k, v) in pairs {
            raw.txt.insert(k.to_string(), v.to_string());
        }
        raw
    }

    fn build(raws: Vec<RawService>, hostname: Option<&str>) -> Vec<Service> {
        let mut registry = Registry::new();
        let hostnames: BTreeSet<String> = hostname.iter().map(|h| h.to_string()).collect();
        raws.into_iter()
            .map(|r| {
                let cluster = registry.resolve(&r.addresses, &hostnames);
                Service::from_raw(r, cluster, Utc::now())
            })
            .collect()
    }

    const ADDR: &[&str] = &["192.168.1.50"];

    #[test]
    fn test_empty_set_has_no_name() {
        assert_eq!(name_for(&[]), None);
    }

    #[test]
    fn test_cast_receiver_beats_generic_service() {
        let services = build(
            vec![
                raw("a", "_http._tcp", ADDR, 8008),
                with_txt(raw("Chromecast-1234abcd", "_googlecast._tcp", ADDR, 8009), &[("fn", "Living Room")]),
            ],
            None,
        );

        assert_eq!(name_for(&services).as_deref(), Some("Living Room"));
    }

    #[test]
    fn test_cast_receiver_without_friendly_name() {
        let services = build(vec![raw("Chromecast-1234abcd", "_googlecast._tcp", ADDR, 8009)], None);
        assert_eq!(name_for(&services).as_deref(), Some("Chromecast-1234abcd"));
    }

    #[test]
    fn test_higher_tier_wins() {
        let services = build(
            vec![
                with_txt(raw("Chromecast", "_googlecast._tcp", ADDR, 8009), &[("fn", "Den")]),
                raw("studio-mac", "_ssh._tcp", ADDR, 22),
            ],
            None,
        );

        assert_eq!(name_for(&services).as_deref(), Some("studio-mac"));
    }

    #[test]
    fn test_printer_share_uses_computer_name() {
        let services = build(vec![raw("LaserJet 400 @ Studio iMac", "_ipp._tcp", ADDR, 631)], None);
        assert_eq!(name_for(&services).as_deref(), Some("Studio iMac"));

        let direct = build(vec![raw("Brother HL-L2350DW", "_ipp._tcp", ADDR, 631)], None);
        assert_eq!(name_for(&direct).as_deref(), Some("Brother HL-L2350DW"));
    }

    #[test]
    fn test_sonos_brand_label() {
        let services = build(vec![raw("RINCON_48A6B8", "_sonos._tcp", ADDR, 1443)], None);
        assert_eq!(name_for(&services).as_deref(), Some("Sonos"));
    }

    #[test]
    fn test_homekit_accessory_model() {
        let services = build(vec![with_txt(raw("Hue Bridge", "_hap._tcp", ADDR, 8080), &[("md", "BSB002")])], None);
        assert_eq!(name_for(&services).as_deref(), Some("BSB002 (Hue Bridge)"));

        let bare = build(vec![raw("Eve Energy", "_hap._tcp", ADDR, 80)], None);
        assert_eq!(name_for(&bare).as_deref(), Some("Eve Energy"));
    }

    #[test]
    fn test_airplay_manufacturer_then_model_family() {
        let maker = build(
            vec![with_txt(raw("Bedroom TV", "_airplay._tcp", ADDR, 7000), &[("manufacturer", "LG"), ("model", "OLED55")])],
            None,
        );
        assert_eq!(name_for(&maker).as_deref(), Some("LG (Bedroom TV)"));

        let apple_tv = build(vec![with_txt(raw("Lounge", "_airplay._tcp", ADDR, 7000), &[("model", "AppleTV6,2")])], None);
        assert_eq!(name_for(&apple_tv).as_deref(), Some("Apple TV (Lounge)"));

        let homepod = build(vec![with_txt(raw("Kitchen", "_airplay._tcp", ADDR, 7000), &[("model", "AudioAccessory5,1")])], None);
        assert_eq!(name_for(&homepod).as_deref(), Some("HomePod (Kitchen)"));

        let unknown = build(vec![with_txt(raw("Speaker", "_airplay._tcp", ADDR, 7000), &[("model", "XYZ1")])], None);
        assert_eq!(name_for(&unknown).as_deref(), Some("Speaker"));
    }

    #[test]
    fn test_home_assistant_location() {
        let named = build(
            vec![with_txt(raw("Home", "_home-assistant._tcp", ADDR, 8123), &[("location_name", "Cabin")])],
            None,
        );
        assert_eq!(name_for(&named).as_deref(), Some("Home Assistant (Cabin)"));

        let fresh = build(vec![raw("Home", "_home-assistant._tcp", ADDR, 8123)], None);
        assert_eq!(name_for(&fresh).as_deref(), Some("Home Assistant (New)"));
    }

    #[test]
    fn test_tie_break_within_tier() {
        let services = build(
            vec![
                raw("zeta", "_ssh._tcp", ADDR, 22),
                raw("alpha", "_ssh._tcp", ADDR, 2222),
            ],
            None,
        );
        assert_eq!(name_for(&services).as_deref(), Some("alpha"));

        let reversed = build(
            vec![
                raw("alpha", "_ssh._tcp", ADDR, 2222),
                raw("zeta", "_ssh._tcp", ADDR, 22),
            ],
            None,
        );
        assert_eq!(name_for(&reversed).as_deref(), Some("alpha"));
    }

    #[test]
    fn test_fallback_prefers_shorter_hostname() {
        let services = build(vec![raw("Generic Web Interface", "_http._tcp", ADDR, 80)], Some("foo.local."));
        assert_eq!(name_for(&services).as_deref(), Some("foo"));
    }

    #[test]
    fn test_fallback_prefers_shorter_service_name() {
        let services = build(vec![raw("nas", "_http._tcp", ADDR, 80)], Some("synology-ds920.local."));
        assert_eq!(name_for(&services).as_deref(), Some("nas"));
    }

    #[test]
    fn test_fallback_without_hostname() {
        let services = build(vec![raw("web-b", "_http._tcp", ADDR, 80), raw("web-a", "_http._tcp", ADDR, 81)], None);
        assert_eq!(name_for(&services).as_deref(), Some("web-a"));
    }
}
