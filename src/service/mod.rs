pub mod alert_config_service;
pub mod channel_service;
pub mod cleanup_service;
pub mod dashboard_service;
pub mod event_service;
pub mod website_service;


use serde_json::Value;

use crate::client::http_client::HttpClient;
use crate::common::backend::Backend;
use crate::config::app_config::AppConfig;

pub(crate) async fn fetch_listing(
    client: &HttpClient,
    backend: &Backend,
    path: &str,
) -> Result<Vec<Value>, anyhow::Error> {
    let response = client.get(backend, path).await?;
    Ok(response.error_for_status()?.json::<Vec<Value>>().await?)
}

/// Source listing for the sequential migrators: either the local JSON cache
/// file, or the source API with a write-through to that file.
pub(crate) async fn load_source_objects(
    client: &HttpClient,
    source: &Backend,
    path: &str,
    app_config: &AppConfig,
    kind: &str,
) -> Option<Vec<Value>> {
    if app_config.general.objects_source.eq_ignore_ascii_case("file") {
        let file_path = &app_config.general.objects_file_path;
        info!("reading {} from {}", kind, file_path);
        let raw = match std::fs::read_to_string(file_path) {
            Ok(raw) => raw,
            Err(e) => {
                error!("error reading source file {}: {}", file_path, e);
                return None;
            }
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(objects) => {
                info!("loaded {} {} from file", objects.len(), kind);
                Some(objects)
            }
            Err(e) => {
                error!("invalid JSON in source file {}: {}", file_path, e);
                None
            }
        }
    } else {
        info!("fetching {} from the source API", kind);
        let objects = match fetch_listing(client, source, path).await {
            Ok(objects) => objects,
            Err(e) => {
                error!("error retrieving source {} from API: {:#}", kind, e);
                return None;
            }
        };
        cache_listing(&app_config.general.objects_file_path, &objects, kind);
        info!("fetched {} {} from the source API", objects.len(), kind);
        Some(objects)
    }
}

/// Pass-through cache of an API listing for later file-based runs. Failure
/// to write is not fatal to the migration itself.
fn cache_listing(file_path: &str, objects: &[Value], kind: &str) {
    match serde_json::to_string_pretty(objects) {
        Ok(raw) => {
            if let Err(e) = std::fs::write(file_path, raw) {
                warn!("could not write {} cache file {}: {}", kind, file_path, e);
            }
        }
        Err(e) => warn!("could not serialize {} cache: {}", kind, e),
    }
}

pub(crate) fn name_of(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
