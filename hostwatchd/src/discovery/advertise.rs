use std::collections::HashMap;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use anyhow::{Context, Result};
use shared::protocol::{API_PREFIX, SELF_SERVICE_TYPE, TXT_API};
use crate::config::AdvertiseConfig;

/// Advertise this daemon so other instances can find and name it.
pub fn register_self(
    daemon: &ServiceDaemon,
    config: &AdvertiseConfig,
    api_port: u16,
) -> Result<ServiceInfo> {
    let hostname = hostname::get()
        .context("Failed to get system hostname")?
        .to_string_lossy()
        .to_string();

    let instance_name = config
        .instance
        .clone()
        .unwrap_or_else(|| format!("hostwatch-{}", hostname));
    let host_name = format!("{}.local.", hostname.trim_end_matches(".local"));

    let txt_records = HashMap::from([(TXT_API.to_string(), API_PREFIX.to_string())]);

    // No explicit address: mdns-sd fills in the interface addresses
    let service_info = ServiceInfo::new(
        SELF_SERVICE_TYPE,
        &instance_name,
        &host_name,
        "",
        api_port,
        txt_records,
    )
    .context("Failed to create ServiceInfo")?
    .enable_addr_auto();

    daemon
        .register(service_info.clone())
        .context("Failed to register mDNS service")?;

    tracing::info!(
        "Registered {} as {} on port {}",
        SELF_SERVICE_TYPE,
        instance_name,
        api_port
    );

    Ok(service_info)
}

pub fn unregister_self(daemon: &ServiceDaemon, service_info: &ServiceInfo) -> Result<()> {
    daemon
        .unregister(service_info.get_fullname())
        .context("Failed to unregister mDNS service")?;

    tracing::info!("Unregistered {}", service_info.get_fullname());
    Ok(())
}
