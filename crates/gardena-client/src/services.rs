//! Lookup of a single service inside the all-devices status tree.

use serde_json::Value;

/// Find the service with `service_id` and `service_type` in the output of
/// [`GardenaClient::all_devices_status`](crate::GardenaClient::all_devices_status).
///
/// Walks locations → `devices` → `services`; the first match wins. Locations
/// without a `devices` array are skipped with a warning.
pub fn find_service(locations: &[Value], service_id: &str, service_type: &str) -> Option<Value> {
    for location in locations {
        let Some(devices) = location.get("devices").and_then(Value::as_array) else {
            tracing::warn!(
                location = ?location.get("id"),
                "location has no devices list; input does not look like device status"
            );
            continue;
        };

        let found = devices
            .iter()
            .filter_map(|device| device.get("services").and_then(Value::as_array))
            .flatten()
            .find(|service| {
                service.get("id").and_then(Value::as_str) == Some(service_id)
                    && service.get("type").and_then(Value::as_str) == Some(service_type)
            });

        if let Some(service) = found {
            return Some(service.clone());
        }
    }
    None
}
