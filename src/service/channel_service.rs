use serde_json::Value;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::ALERT_CHANNELS_PATH;
use crate::config::app_config::AppConfig;
use crate::service::{fetch_listing, load_source_objects, name_of};
use crate::util::prompt::prompt_item_action;
use crate::vojo::duplicate_policy::ItemAction;
use crate::vojo::migration_tally::MigrationTally;

/// Migrates alert channels sequentially, asking per duplicate. Payloads are
/// normalized per channel type before transmission.
pub async fn migrate(app_config: &AppConfig) -> Result<MigrationTally, anyhow::Error> {
    app_config.validate()?;
    info!("starting migration of alert channel configurations");

    let client = HttpClient::new(
        app_config.general.verify_ssl,
        app_config.tuning.request_timeout,
        RetryPolicy::new(app_config.tuning.retry_attempts),
    )?;
    let source = Backend::new(&app_config.source.url, &app_config.source.token);
    let target = Backend::new(&app_config.target.url, &app_config.target.token);

    let source_channels = match load_source_objects(
        &client,
        &source,
        ALERT_CHANNELS_PATH,
        app_config,
        "alert channels",
    )
    .await
    {
        Some(channels) => channels,
        None => return Ok(MigrationTally::default()),
    };

    let target_channels = match fetch_listing(&client, &target, ALERT_CHANNELS_PATH).await {
        Ok(channels) => channels,
        Err(e) => {
            error!("error retrieving target channels: {:#}", e);
            return Ok(MigrationTally {
                source: source_channels.len(),
                ..MigrationTally::default()
            });
        }
    };
    let target_names: Vec<String> = target_channels
        .iter()
        .filter_map(|channel| name_of(channel, "name"))
        .collect();

    let mut tally = MigrationTally {
        source: source_channels.len(),
        ..MigrationTally::default()
    };

    for channel in source_channels {
        let name = match name_of(&channel, "name") {
            Some(name) => name,
            None => {
                info!("skipping channel with no name");
                continue;
            }
        };

        if target_names.iter().any(|existing| existing == &name) {
            match prompt_item_action("channel", &name)? {
                ItemAction::Skip => {
                    info!(
                        "skipping channel '{}', it already exists in the target system",
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
                        "updating channel '{}', it already exists in the target system",
                        name
                    );
                    if update_channel(&client, &target, &channel, &name, &target_channels).await {
                        tally.updated += 1;
                        continue;
                    }
                }
            }
        }

        // The id field stays in the payload, the target API requires it.
        if create_channel(&client, &target, &channel, &name).await {
            tally.migrated += 1;
        }
    }

    info!(
        "migration complete: found {} source channels, migrated {}, updated {}, skipped {}",
        tally.source, tally.migrated, tally.updated, tally.skipped
    );
    Ok(tally)
}

/// Normalizes a channel payload for the target API: strips rbac tags and
/// fills the per-type required fields the listing endpoint may omit.
/// Unknown channel types pass through unchanged.
fn format_channel_for_api(channel: &Value) -> Value {
    let mut formatted = channel.clone();
    let object = match formatted.as_object_mut() {
        Some(object) => object,
        None => return channel.clone(),
    };
    object.remove("rbacTags");

    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let ensure = |object: &mut serde_json::Map<String, Value>, key: &str, value: Value| {
        if !object.contains_key(key) {
            object.insert(key.to_string(), value);
        }
    };

    match kind.as_str() {
        "EMAIL" => {
            ensure(object, "emails", json!(["example@example.com"]));
            ensure(object, "customEmailSubjectPrefix", Value::Null);
        }
        "SLACK" => {
            ensure(object, "webhookUrl", json!("https://example.com/webhook"));
            ensure(object, "channel", json!("alerts"));
            ensure(object, "emojiRendering", json!(false));
        }
        "WEB_HOOK" => {
            ensure(object, "webhookUrls", json!(["https://webhook.example.com"]));
            ensure(object, "headers", json!([]));
        }
        "BIDIRECTIONAL_SLACK" => {
            ensure(object, "appId", json!("placeholder_app_id"));
            ensure(object, "teamId", json!("placeholder_team_id"));
            ensure(object, "channelId", json!("placeholder_channel_id"));
            ensure(object, "channelName", json!("alerts"));
            ensure(object, "emojiRendering", json!(false));
        }
        "BIDIRECTIONAL_MS_TEAMS" => {
            ensure(object, "apiTokenId", json!("placeholder_token_id"));
            ensure(object, "channelId", json!("placeholder_channel_id"));
            ensure(object, "channelName", json!("alerts"));
            ensure(object, "instanaUrl", json!("https://instana.example.com"));
            ensure(object, "serviceUrl", json!("https://teams.example.com"));
            ensure(object, "teamId", json!("placeholder_team_id"));
            ensure(object, "teamName", json!("placeholder_team"));
            ensure(object, "tenantId", json!("placeholder_tenant_id"));
            ensure(object, "tenantName", json!("placeholder_tenant"));
        }
        "GOOGLE_CHAT" => {
            ensure(
                object,
                "webhookUrl",
                json!("https://chat.googleapis.com/webhook"),
            );
        }
        "OFFICE_365" => {
            ensure(
                object,
                "webhookUrl",
                json!("https://webhook.office365.com/webhook"),
            );
        }
        "OPS_GENIE" => {
            ensure(object, "apiKey", json!("placeholder_api_key"));
            ensure(object, "region", json!("US"));
            ensure(object, "alias", json!(""));
            ensure(object, "tags", json!(""));
        }
        "PAGER_DUTY" => {
            ensure(
                object,
                "serviceIntegrationKey",
                json!("placeholder_integration_key"),
            );
        }
        _ => {}
    }

    formatted
}

async fn create_channel(
    client: &HttpClient,
    target: &Backend,
    channel: &Value,
    name: &str,
) -> bool {
    let formatted = format_channel_for_api(channel);
    debug!("creating channel '{}' with payload {}", name, formatted);
    let result: Result<Value, anyhow::Error> = async {
        let response = client.post(target, ALERT_CHANNELS_PATH, &formatted).await?;
        Ok(response.error_for_status()?.json::<Value>().await?)
    }
    .await;
    match result {
        Ok(created) => {
            if let Some(id) = created.get("id").and_then(Value::as_str) {
                info!("migrated alert channel '{}' (target id {})", name, id);
                true
            } else {
                error!("failed to migrate alert channel '{}': no id returned", name);
                false
            }
        }
        Err(e) => {
            error!("failed to migrate alert channel '{}': {:#}", name, e);
            false
        }
    }
}

async fn update_channel(
    client: &HttpClient,
    target: &Backend,
    channel: &Value,
    name: &str,
    target_channels: &[Value],
) -> bool {
    let target_id = target_channels
        .iter()
        .find(|candidate| candidate.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|candidate| candidate.get("id"))
        .and_then(Value::as_str);
    let target_id = match target_id {
        Some(id) => id.to_string(),
        None => {
            error!("failed to find a matching target channel for '{}'", name);
            return false;
        }
    };
    info!("updating channel with target id {}", target_id);

    let formatted = format_channel_for_api(channel);
    let path = format!("{}/{}", ALERT_CHANNELS_PATH, target_id);
    let result: Result<Value, anyhow::Error> = async {
        let response = client.put(target, &path, &formatted).await?;
        Ok(response.error_for_status()?.json::<Value>().await?)
    }
    .await;
    match result {
        Ok(updated) => {
            if let Some(id) = updated.get("id").and_then(Value::as_str) {
                info!("updated alert channel '{}' (target id {})", name, id);
                true
            } else {
                error!("failed to update alert channel '{}': no id returned", name);
                false
            }
        }
        Err(e) => {
            error!("failed to update alert channel '{}': {:#}", name, e);
            false
        }
    }
}
