use serde_json::Value;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::CUSTOM_EVENTS_PATH;
use crate::config::app_config::AppConfig;
use crate::service::{fetch_listing, load_source_objects, name_of};
use crate::util::prompt::prompt_item_action;
use crate::vojo::duplicate_policy::ItemAction;
use crate::vojo::migration_tally::MigrationTally;

/// Migrates custom event specifications sequentially, asking per duplicate.
pub async fn migrate(app_config: &AppConfig) -> Result<MigrationTally, anyhow::Error> {
    app_config.validate()?;
    info!("starting migration of custom event configurations");

    let client = HttpClient::new(
        app_config.general.verify_ssl,
        app_config.tuning.request_timeout,
        RetryPolicy::new(app_config.tuning.retry_attempts),
    )?;
    let source = Backend::new(&app_config.source.url, &app_config.source.token);
    let target = Backend::new(&app_config.target.url, &app_config.target.token);

    let source_events = match load_source_objects(
        &client,
        &source,
        CUSTOM_EVENTS_PATH,
        app_config,
        "custom events",
    )
    .await
    {
        Some(events) => events,
        None => return Ok(MigrationTally::default()),
    };

    let target_events = match fetch_listing(&client, &target, CUSTOM_EVENTS_PATH).await {
        Ok(events) => events,
        Err(e) => {
            error!("error retrieving target events: {:#}", e);
            return Ok(MigrationTally {
                source: source_events.len(),
                ..MigrationTally::default()
            });
        }
    };
    let target_names: Vec<String> = target_events
        .iter()
        .filter_map(|event| name_of(event, "name"))
        .collect();

    let mut tally = MigrationTally {
        source: source_events.len(),
        ..MigrationTally::default()
    };

    for event in source_events {
        let name = match name_of(&event, "name") {
            Some(name) => name,
            None => {
                info!("skipping event with no name");
                continue;
            }
        };

        // Queries referring to instance-local ids cannot work on the target.
        if let Some(query) = event.get("query").and_then(Value::as_str) {
            if query.contains(".id") {
                info!(
                    "skipping event '{}', its query contains an id reference from the source system",
                    name
                );
                tally.skipped += 1;
                continue;
            }
        }

        if target_names.iter().any(|existing| existing == &name) {
            match prompt_item_action("event", &name)? {
                ItemAction::Skip => {
                    info!("skipping event '{}', it already exists in the target system", name);
                    tally.skipped += 1;
                    continue;
                }
                ItemAction::Cancel => {
                    info!("migration cancelled by user");
                    break;
                }
                ItemAction::Update => {
                    info!("updating event '{}', it already exists in the target system", name);
                    if update_event(&client, &target, event.clone(), &name, &target_events).await {
                        tally.updated += 1;
                        continue;
                    }
                    // An update that could not be applied falls back to a
                    // plain create attempt.
                }
            }
        }

        let mut payload = event;
        if let Some(object) = payload.as_object_mut() {
            object.remove("id");
        }
        if create_event(&client, &target, &payload, &name).await {
            tally.migrated += 1;
        }
    }

    info!(
        "migration complete: found {} source events, migrated {}, updated {}, skipped {}",
        tally.source, tally.migrated, tally.updated, tally.skipped
    );
    Ok(tally)
}

async fn create_event(client: &HttpClient, target: &Backend, event: &Value, name: &str) -> bool {
    let result: Result<Value, anyhow::Error> = async {
        let response = client.post(target, CUSTOM_EVENTS_PATH, event).await?;
        Ok(response.error_for_status()?.json::<Value>().await?)
    }
    .await;
    match result {
        Ok(created) => {
            if let Some(id) = created.get("id").and_then(Value::as_str) {
                info!("migrated custom event '{}' (target id {})", name, id);
                true
            } else {
                error!("failed to migrate custom event '{}': no id returned", name);
                false
            }
        }
        Err(e) => {
            error!("failed to migrate custom event '{}': {:#}", name, e);
            false
        }
    }
}

async fn update_event(
    client: &HttpClient,
    target: &Backend,
    event: Value,
    name: &str,
    target_events: &[Value],
) -> bool {
    let target_id = target_events
        .iter()
        .find(|candidate| candidate.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|candidate| candidate.get("id"))
        .and_then(Value::as_str);
    let target_id = match target_id {
        Some(id) => id.to_string(),
        None => {
            error!("failed to find a matching target event for '{}'", name);
            return false;
        }
    };
    info!("updating event with target id {}", target_id);

    let mut payload = event;
    if let Some(object) = payload.as_object_mut() {
        object.remove("id");
    }
    let path = format!("{}/{}", CUSTOM_EVENTS_PATH, target_id);
    let result: Result<Value, anyhow::Error> = async {
        let response = client.put(target, &path, &payload).await?;
        Ok(response.error_for_status()?.json::<Value>().await?)
    }
    .await;
    match result {
        Ok(updated) => {
            if let Some(id) = updated.get("id").and_then(Value::as_str) {
                info!("updated custom event '{}' (target id {})", name, id);
                true
            } else {
                error!("failed to update custom event '{}': no id returned", name);
                false
            }
        }
        Err(e) => {
            error!("failed to update custom event '{}': {:#}", name, e);
            false
        }
    }
}
