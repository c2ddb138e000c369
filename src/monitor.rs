//! Container health, read from a `podman ps --format json` snapshot that an
//! external job keeps up to date.

use log::warn;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

type ContainerStatus = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub service_name: String,
    /// The matching container's record, or empty when the name matches no
    /// container or more than one.
    pub service_status: ContainerStatus,
}

/// Reads the snapshot and resolves each service. A missing or malformed file
/// yields an empty list.
pub fn read_service_statuses<P: AsRef<Path>>(path: P, services: &[String]) -> Vec<ServiceStatus> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("cannot read monitor file {}: {e}", path.display());
            return Vec::new();
        }
    };
    let containers: Vec<ContainerStatus> = match serde_json::from_str(&contents) {
        Ok(containers) => containers,
        Err(e) => {
            warn!("invalid monitor file {}: {e}", path.display());
            return Vec::new();
        }
    };

    resolve_services(&containers, services)
}

pub fn resolve_services(containers: &[ContainerStatus], services: &[String]) -> Vec<ServiceStatus> {
    services
        .iter()
        .map(|service_name| {
            let matching: Vec<&ContainerStatus> = containers
                .iter()
                .filter(|c| container_names(c).any(|name| name.contains(service_name.as_str())))
                .collect();

            let service_status = match matching.as_slice() {
                [] => {
                    warn!("container {service_name} does not match any container names found in `podman ps`");
                    Map::new()
                }
                [only] => (*only).clone(),
                many => {
                    let ids: Vec<&str> = many.iter().map(|c| container_id(c)).collect();
                    warn!(
                        "multiple containers ({}) match name \"{service_name}\"",
                        ids.join(", ")
                    );
                    Map::new()
                }
            };

            ServiceStatus {
                service_name: service_name.clone(),
                service_status,
            }
        })
        .collect()
}

fn container_names(container: &ContainerStatus) -> impl Iterator<Item = &str> {
    container
        .get("Names")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn container_id(container: &ContainerStatus) -> &str {
    container.get("Id").and_then(Value::as_str).unwrap_or("?")
}
