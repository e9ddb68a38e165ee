use std::io::BufRead;
use std::io::Write;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::CUSTOM_DASHBOARDS_PATH;
use crate::config::app_config::AppConfig;
use crate::vojo::dashboard::DashboardSummary;

/// Deletes every custom dashboard from the target backend after an explicit
/// typed confirmation. Returns the deleted and failed counts.
pub async fn delete_all_dashboards(
    app_config: &AppConfig,
) -> Result<(usize, usize), anyhow::Error> {
    app_config.validate()?;
    delete_all_dashboards_from(app_config, &mut std::io::stdin().lock()).await
}

pub(crate) async fn delete_all_dashboards_from(
    app_config: &AppConfig,
    input: &mut dyn BufRead,
) -> Result<(usize, usize), anyhow::Error> {
    let client = HttpClient::new(
        app_config.general.verify_ssl,
        app_config.tuning.request_timeout,
        RetryPolicy::new(app_config.tuning.retry_attempts),
    )?;
    let target = Backend::new(&app_config.target.url, &app_config.target.token);

    info!("fetching all dashboards from target {}", target.base_url());
    let response = client.get(&target, CUSTOM_DASHBOARDS_PATH).await?;
    let dashboards = response
        .error_for_status()?
        .json::<Vec<DashboardSummary>>()
        .await?;
    info!("found {} dashboards", dashboards.len());

    if dashboards.is_empty() {
        println!("No dashboards to delete.");
        return Ok((0, 0));
    }

    println!();
    println!("WARNING: this will DELETE ALL dashboards from the target system!");
    println!();
    for dashboard in &dashboards {
        println!(
            "  - {} (id: {})",
            dashboard.title.as_deref().unwrap_or("N/A"),
            dashboard.id.as_deref().unwrap_or("N/A")
        );
    }
    println!();
    print!("Type 'DELETE ALL' to confirm: ");
    std::io::stdout().flush()?;
    let mut confirmation = String::new();
    input.read_line(&mut confirmation)?;
    if confirmation.trim() != "DELETE ALL" {
        println!("Cancelled.");
        return Ok((0, 0));
    }

    let mut deleted = 0;
    let mut failed = 0;
    for dashboard in dashboards {
        let title = dashboard.title.as_deref().unwrap_or("N/A").to_string();
        let id = match dashboard.id {
            Some(id) => id,
            None => {
                warn!("skipping dashboard '{}', it has no id", title);
                failed += 1;
                continue;
            }
        };

        let path = format!("{}/{}", CUSTOM_DASHBOARDS_PATH, id);
        let result: Result<(), anyhow::Error> = async {
            let response = client.delete(&target, &path).await?;
            response.error_for_status()?;
            Ok(())
        }
        .await;
        match result {
            Ok(()) => {
                info!("deleted dashboard '{}' (id {})", title, id);
                deleted += 1;
            }
            Err(e) => {
                error!("failed to delete dashboard '{}' (id {}): {:#}", title, id, e);
                failed += 1;
            }
        }
    }

    info!("deletion complete: {} deleted, {} failed", deleted, failed);
    Ok((deleted, failed))
}
