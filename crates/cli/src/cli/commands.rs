//! Client-backed subcommands. Each returns the JSON value to print.

use anyhow::Context;
use gs_client::{find_service, CommandType, GardenaClient};
use serde_json::{json, Value};

use super::ControlArgs;

pub async fn login_status(client: &GardenaClient) -> Value {
    json!({ "loggedIn": client.login_status().await })
}

pub async fn locations(client: &GardenaClient) -> anyhow::Result<Value> {
    let locations = client.locations().await.context("fetching locations")?;
    Ok(serde_json::to_value(locations)?)
}

pub async fn devices(client: &GardenaClient) -> anyhow::Result<Value> {
    let status = client
        .all_devices_status()
        .await
        .context("fetching device status")?;
    Ok(Value::Array(status))
}

pub async fn location(client: &GardenaClient, id: &str) -> anyhow::Result<Value> {
    let entity = client
        .location_devices(id)
        .await
        .with_context(|| format!("fetching location {id}"))?;
    Ok(Value::Object(entity))
}

pub async fn control(
    client: &GardenaClient,
    command: CommandType,
    args: &ControlArgs,
) -> anyhow::Result<Value> {
    let resp = client
        .send_service_control(&args.service_id, &args.operation, args.minutes, command)
        .await
        .with_context(|| format!("sending {command} {} to {}", args.operation, args.service_id))?;
    Ok(json!({ "status": resp.status, "body": resp.body }))
}

pub async fn service_status(
    client: &GardenaClient,
    id: &str,
    service_type: &str,
) -> anyhow::Result<Value> {
    let status = client
        .all_devices_status()
        .await
        .context("fetching device status")?;
    find_service(&status, id, service_type)
        .with_context(|| format!("no {service_type} service with id {id}"))
}
