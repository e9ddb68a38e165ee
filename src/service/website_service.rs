use std::collections::HashMap;

use serde_json::Value;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::WEBSITE_CONFIGS_PATH;
use crate::config::app_config::AppConfig;
use crate::service::{fetch_listing, load_source_objects, name_of};
use crate::vojo::migration_tally::MigrationTally;

/// Migrates website monitoring configs: only the name travels (the target
/// assigns its own id), and configs whose name already exists are skipped.
pub async fn migrate(app_config: &AppConfig) -> Result<MigrationTally, anyhow::Error> {
    app_config.validate()?;
    info!("starting migration of website configurations");

    let client = HttpClient::new(
        app_config.general.verify_ssl,
        app_config.tuning.request_timeout,
        RetryPolicy::new(app_config.tuning.retry_attempts),
    )?;
    let source = Backend::new(&app_config.source.url, &app_config.source.token);
    let target = Backend::new(&app_config.target.url, &app_config.target.token);

    let source_websites = match load_source_objects(
        &client,
        &source,
        WEBSITE_CONFIGS_PATH,
        app_config,
        "website configurations",
    )
    .await
    {
        Some(websites) if !websites.is_empty() => websites,
        _ => return Ok(MigrationTally::default()),
    };

    let target_websites = match fetch_listing(&client, &target, WEBSITE_CONFIGS_PATH).await {
        Ok(websites) => websites,
        Err(e) => {
            error!("error retrieving target website configurations: {:#}", e);
            return Ok(MigrationTally {
                source: source_websites.len(),
                ..MigrationTally::default()
            });
        }
    };

    let mut website_mapping = build_website_mapping(&source_websites, &target_websites);

    let mut tally = MigrationTally {
        source: source_websites.len(),
        ..MigrationTally::default()
    };

    for website in &source_websites {
        let (id, name) = match (name_of(website, "id"), name_of(website, "name")) {
            (Some(id), Some(name)) => (id, name),
            _ => {
                info!("skipping website with missing name or id: {}", website);
                continue;
            }
        };

        if website_mapping.contains_key(&id) {
            info!("website '{}' already exists in the target backend, skipping", name);
            tally.skipped += 1;
            continue;
        }

        if create_website(&client, &target, &name).await {
            // Re-list to learn the id the target assigned to the new site.
            if let Ok(updated_targets) = fetch_listing(&client, &target, WEBSITE_CONFIGS_PATH).await
            {
                if let Some(new_id) = updated_targets
                    .iter()
                    .find(|candidate| candidate.get("name").and_then(Value::as_str) == Some(&name))
                    .and_then(|candidate| candidate.get("id"))
                    .and_then(Value::as_str)
                {
                    website_mapping.insert(id, new_id.to_string());
                }
            }
            tally.migrated += 1;
        }
    }

    debug!("website id mapping after migration: {:?}", website_mapping);
    info!(
        "migration complete: found {} source websites, migrated {}, skipped {}",
        tally.source, tally.migrated, tally.skipped
    );
    Ok(tally)
}

/// Source website id to target website id, matched by name.
fn build_website_mapping(
    source_websites: &[Value],
    target_websites: &[Value],
) -> HashMap<String, String> {
    let mut target_by_name: HashMap<&str, &str> = HashMap::new();
    for website in target_websites {
        if let (Some(name), Some(id)) = (
            website.get("name").and_then(Value::as_str),
            website.get("id").and_then(Value::as_str),
        ) {
            target_by_name.insert(name, id);
        }
    }

    let mut mapping = HashMap::new();
    for website in source_websites {
        if let (Some(name), Some(id)) = (
            website.get("name").and_then(Value::as_str),
            website.get("id").and_then(Value::as_str),
        ) {
            if let Some(target_id) = target_by_name.get(name) {
                mapping.insert(id.to_string(), (*target_id).to_string());
            }
        }
    }
    mapping
}

async fn create_website(client: &HttpClient, target: &Backend, name: &str) -> bool {
    let result: Result<(), anyhow::Error> = async {
        let response = client
            .post_with_query(target, WEBSITE_CONFIGS_PATH, &[("name", name)], &json!([]))
            .await?;
        response.error_for_status()?;
        Ok(())
    }
    .await;
    match result {
        Ok(()) => {
            info!("successfully created website '{}'", name);
            true
        }
        Err(e) => {
            error!("error creating website '{}' in target backend: {:#}", name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_matches_by_name() {
        let source = vec![
            json!({"id": "s1", "name": "shop"}),
            json!({"id": "s2", "name": "blog"}),
            json!({"id": "s3"}),
        ];
        let target = vec![
            json!({"id": "t1", "name": "shop"}),
            json!({"id": "t9", "name": "docs"}),
        ];
        let mapping = build_website_mapping(&source, &target);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["s1"], "t1");
    }
}
