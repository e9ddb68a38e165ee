use serde_json::Value;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::ALERT_CONFIGS_PATH;
use crate::config::app_config::AppConfig;
use crate::service::{fetch_listing, load_source_objects, name_of};
use crate::util::prompt::prompt_item_action;
use crate::vojo::duplicate_policy::ItemAction;
use crate::vojo::migration_tally::MigrationTally;

/// Migrates alert configurations sequentially; the duplicate key is
/// `alertName`. Referenced event and channel ids are carried as-is.
pub async fn migrate(app_config: &AppConfig) -> Result<MigrationTally, anyhow::Error> {
    app_config.validate()?;
    info!("starting migration of alert configurations");

    let client = HttpClient::new(
        app_config.general.verify_ssl,
        app_config.tuning.request_timeout,
        RetryPolicy::new(app_config.tuning.retry_attempts),
    )?;
    let source = Backend::new(&app_config.source.url, &app_config.source.token);
    let target = Backend::new(&app_config.target.url, &app_config.target.token);

    let source_configs = match load_source_objects(
        &client,
        &source,
        ALERT_CONFIGS_PATH,
        app_config,
        "alert configurations",
    )
    .await
    {
        Some(configs) => configs,
        None => return Ok(MigrationTally::default()),
    };

    let target_configs = match fetch_listing(&client, &target, ALERT_CONFIGS_PATH).await {
        Ok(configs) => configs,
        Err(e) => {
            error!("error retrieving target alert configurations: {:#}", e);
            return Ok(MigrationTally {
                source: source_configs.len(),
                ..MigrationTally::default()
            });
        }
    };
    let target_names: Vec<String> = target_configs
        .iter()
        .filter_map(|config| name_of(config, "alertName"))
        .collect();

    let mut tally = MigrationTally {
        source: source_configs.len(),
        ..MigrationTally::default()
    };

    for config in source_configs {
        let name = match name_of(&config, "alertName") {
            Some(name) => name,
            None => continue,
        };

        if target_names.iter().any(|existing| existing == &name) {
            match prompt_item_action("alert configuration", &name)? {
                ItemAction::Skip => {
                    info!(
                        "skipping alert configuration '{}', it already exists in the target system",
                        name
                    );
                    tally.skipped += 1;
                    continue;
                }
                ItemAction::Cancel => {
                    info!("migration cancelled by user");
                    break;
                }
                ItemAction::Update => {
                    info!(
                        "updating alert configuration '{}', it already exists in the target system",
                        name
                    );
                    let target_id = target_configs
                        .iter()
                        .find(|candidate| {
                            candidate.get("alertName").and_then(Value::as_str) == Some(&name)
                        })
                        .and_then(|candidate| candidate.get("id"))
                        .and_then(Value::as_str);
                    if let Some(target_id) = target_id {
                        if upsert_config(&client, &target, &config, target_id, &name, "update")
                            .await
                        {
                            tally.updated += 1;
                        }
                    } else {
                        error!(
                            "failed to find a matching target alert configuration for '{}'",
                            name
                        );
                    }
                    continue;
                }
            }
        }

        // Creation also goes through PUT: the API addresses alert
        // configurations by their caller-supplied id.
        match format_config_for_api(&config) {
            Ok(formatted) => {
                let id = formatted
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if upsert_raw(&client, &target, &formatted, &id, &name, "create").await {
                    tally.migrated += 1;
                }
            }
            Err(e) => error!("cannot migrate alert configuration '{}': {:#}", name, e),
        }
    }

    info!(
        "migration complete: found {} source alert configurations, migrated {}, updated {}, skipped {}",
        tally.source, tally.migrated, tally.updated, tally.skipped
    );
    Ok(tally)
}

async fn upsert_config(
    client: &HttpClient,
    target: &Backend,
    config: &Value,
    target_id: &str,
    name: &str,
    action: &str,
) -> bool {
    match format_config_for_api(config) {
        Ok(formatted) => upsert_raw(client, target, &formatted, target_id, name, action).await,
        Err(e) => {
            error!("cannot {} alert configuration '{}': {:#}", action, name, e);
            false
        }
    }
}

async fn upsert_raw(
    client: &HttpClient,
    target: &Backend,
    formatted: &Value,
    id: &str,
    name: &str,
    action: &str,
) -> bool {
    let path = format!("{}/{}", ALERT_CONFIGS_PATH, id);
    let result: Result<Value, anyhow::Error> = async {
        let response = client.put(target, &path, formatted).await?;
        Ok(response.error_for_status()?.json::<Value>().await?)
    }
    .await;
    match result {
        Ok(stored) => {
            info!(
                "{}d alert configuration '{}' (target id {})",
                action,
                name,
                stored.get("id").and_then(|v| v.as_str()).unwrap_or("unknown")
            );
            true
        }
        Err(e) => {
            error!("error {} alert configuration '{}': {:#}", action, name, e);
            false
        }
    }
}

/// Strips read-only fields and fills the structural defaults the API
/// insists on. `id` and `alertName` are mandatory.
fn format_config_for_api(config: &Value) -> Result<Value, anyhow::Error> {
    let mut formatted = config.clone();
    let object = formatted
        .as_object_mut()
        .ok_or_else(|| anyhow!("alert configuration is not a JSON object"))?;

    for read_only in ["lastUpdated", "invalid", "alertChannelNames", "applicationNames"] {
        object.remove(read_only);
    }

    if !object.contains_key("id") {
        return Err(anyhow!("alert configuration must have an 'id' field"));
    }
    if !object.contains_key("alertName") {
        return Err(anyhow!("alert configuration must have an 'alertName' field"));
    }

    if !object.contains_key("eventFilteringConfiguration") {
        object.insert(
            "eventFilteringConfiguration".to_string(),
            json!({
                "query": null,
                "ruleIds": [],
                "eventTypes": [],
                "applicationAlertConfigIds": [],
                "validVersion": 1
            }),
        );
    }
    if !object.contains_key("customPayloadFields") {
        object.insert("customPayloadFields".to_string(), json!([]));
    }
    if !object.contains_key("integrationIds") {
        object.insert("integrationIds".to_string(), json!([]));
    }
    if !object.contains_key("muteUntil") {
        object.insert("muteUntil".to_string(), json!(0));
    }
    if !object.contains_key("includeEntityNameInLegacyAlerts") {
        object.insert("includeEntityNameInLegacyAlerts".to_string(), json!(false));
    }

    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rejects_missing_id_or_name() {
        assert!(format_config_for_api(&json!({"alertName": "disk"})).is_err());
        assert!(format_config_for_api(&json!({"id": "a-1"})).is_err());
    }

    #[test]
    fn format_strips_read_only_fields_and_fills_defaults() {
        let config = json!({
            "id": "a-1",
            "alertName": "disk",
            "lastUpdated": 123,
            "invalid": false,
            "alertChannelNames": ["ops"],
            "applicationNames": ["shop"]
        });
        let formatted = format_config_for_api(&config).unwrap();
        for gone in ["lastUpdated", "invalid", "alertChannelNames", "applicationNames"] {
            assert!(formatted.get(gone).is_none());
        }
        assert_eq!(formatted["muteUntil"], json!(0));
        assert_eq!(formatted["customPayloadFields"], json!([]));
        assert_eq!(formatted["integrationIds"], json!([]));
        assert_eq!(formatted["includeEntityNameInLegacyAlerts"], json!(false));
        assert_eq!(
            formatted["eventFilteringConfiguration"]["validVersion"],
            json!(1)
        );
    }

    #[test]
    fn format_keeps_existing_structures() {
        let config = json!({
            "id": "a-2",
            "alertName": "cpu",
            "muteUntil": 99,
            "eventFilteringConfiguration": {"ruleIds": ["r1"]}
        });
        let formatted = format_config_for_api(&config).unwrap();
        assert_eq!(formatted["muteUntil"], json!(99));
        assert_eq!(
            formatted["eventFilteringConfiguration"],
            json!({"ruleIds": ["r1"]})
        );
    }
}
