use shared::types::{HostExport, HostSummary, ServiceExport};
use crate::cluster::AddressCluster;
use crate::namer;
use crate::service::{contains_ci, Service};

/// All services sharing one address cluster.
/// Built fresh for every snapshot by the controller.
#[derive(Debug, Clone)]
pub struct Host {
    name: String,
    cluster: AddressCluster,
    services: Vec<Service>,
    alive: bool,
}

impl Host {
    pub(crate) fn new(cluster: AddressCluster, mut services: Vec<Service>) -> Self {
        services.sort_by(|a, b| {
            a.service_type
                .cmp(&b.service_type)
                .then_with(|| a.domain.cmp(&b.domain))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.port.cmp(&b.port))
        });

        let name = namer::name_for(&services).unwrap_or_else(|| cluster.display_address());
        let alive = services.iter().any(|s| s.alive);

        Self { name, cluster, services, alive }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster(&self) -> &AddressCluster {
        &self.cluster
    }

    /// Sorted by (type, domain, name)
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn service(&self, service_type: &str, name: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.service_type == service_type && s.name == name)
    }

    pub fn matches(&self, term: &str) -> bool {
        contains_ci(&self.name, &term.to_lowercase()) || self.services.iter().any(|s| s.matches(term))
    }

    pub fn to_export(&self) -> HostExport {
        HostExport {
            id: self.cluster.id().get(),
            name: self.name.clone(),
            alive: self.alive,
            addresses: self.cluster.sorted_addresses(),
            services: self.services.iter().map(Service::to_export).collect::<Vec<ServiceExport>>(),
        }
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            id: self.cluster.id().get(),
            name: self.name.clone(),
            alive: self.alive,
            address: self.cluster.display_address(),
            service_count: self.services.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::cluster::Registry;
    use crate::service::tests::raw;

    fn host(raws: Vec<shared::types::RawService>) -> Host {
        let mut registry = Registry::new();
        let services: Vec<Service> = raws
            .into_iter()
            .map(|r| {
                let cluster = registry.resolve(&r.addresses, &Default::default());
                Service::from_raw(r, cluster, Utc::now())
            })
            .collect();
        let cluster = services[0].cluster.clone();
        Host::new(cluster, services)
    }

    #[test]
    fn test_services_sorted_by_type_domain_name() {
        let h = host(vec![
            raw("web-b", "_http._tcp", &["10.0.0.9"], 80),
            raw("shell", "_ssh._tcp", &["10.0.0.9"], 22),
            raw("web-a", "_http._tcp", &["10.0.0.9"], 8080),
        ]);

        let names: Vec<&str> = h.services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["web-a", "web-b", "shell"]);
        assert_eq!(h.name(), "shell");
    }

    #[test]
    fn test_alive_if_any_service_alive() {
        let mut registry = Registry::new();
        let r1 = raw("a", "_http._tcp", &["10.0.0.9"], 80);
        let r2 = raw("b", "_ssh._tcp", &["10.0.0.9"], 22);
        let c = registry.resolve(&r1.addresses, &Default::default());
        let mut s1 = Service::from_raw(r1, c.clone(), Utc::now());
        let mut s2 = Service::from_raw(r2, c.clone(), Utc::now());

        s1.alive = false;
        assert!(Host::new(c.clone(), vec![s1.clone(), s2.clone()]).is_alive());

        s2.alive = false;
        assert!(!Host::new(c, vec![s1, s2]).is_alive());
    }

    #[test]
    fn test_matches_name_or_service() {
        let mut r = raw("Chromecast-99", "_googlecast._tcp", &["10.0.0.3"], 8009);
        r.txt.insert("fn".to_string(), "Bedroom".to_string());
        let h = host(vec![r]);

        assert_eq!(h.name(), "Bedroom");
        assert!(h.matches("bedroom"));
        assert!(h.matches("chromecast"));
        assert!(h.matches("10.0.0"));
        assert!(!h.matches("kitchen"));
    }

    #[test]
    fn test_lookup_service() {
        let h = host(vec![
            raw("web", "_http._tcp", &["10.0.0.9"], 80),
            raw("shell", "_ssh._tcp", &["10.0.0.9"], 22),
        ]);

        assert_eq!(h.service("_ssh._tcp", "shell").map(|s| s.port), Some(22));
        assert!(h.service("_ssh._tcp", "web").is_none());
    }

    #[test]
    fn test_export_shape() {
        let h = host(vec![raw("shell", "_ssh._tcp", &["fd00::9", "10.0.0.9"], 22)]);
        let export = h.to_export();

        assert_eq!(export.name, "shell");
        assert_eq!(export.addresses, vec!["10.0.0.9", "fd00::9"]);
        assert_eq!(export.services.len(), 1);
        assert_eq!(h.summary().address, "10.0.0.9");
    }
}
