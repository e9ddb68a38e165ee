use std::collections::HashMap;
use std::io::IsTerminal;

use futures::future::join_all;
use indexmap::IndexMap;
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::client::http_client::HttpClient;
use crate::client::retry::RetryPolicy;
use crate::common::backend::Backend;
use crate::common::common_constants::CUSTOM_DASHBOARDS_PATH;
use crate::common::common_constants::SHAREABLE_USERS_PATH;
use crate::config::app_config::AppConfig;
use crate::util::prompt::resolve_run_strategy;
use crate::util::rate_limiter::RateLimiter;
use crate::vojo::dashboard::AccessRule;
use crate::vojo::dashboard::DashboardRecord;
use crate::vojo::dashboard::DashboardSummary;
use crate::vojo::duplicate_policy::DuplicateStrategy;
use crate::vojo::migration_tally::MigrationOutcome;
use crate::vojo::migration_tally::MigrationTally;
use crate::vojo::user::UserRecord;

/// Shared per-run state: one pooled client, both endpoints, and the two
/// concurrency bounds every network call goes through.
struct MigrationContext {
    client: HttpClient,
    source: Backend,
    target: Backend,
    limiter: RateLimiter,
    gate: Semaphore,
    strategy: DuplicateStrategy,
}

/// Migrates custom dashboards from the source backend to the target backend.
/// The duplicate strategy is decided once up front; the pipeline then runs
/// without further interaction.
pub async fn migrate(app_config: &AppConfig) -> Result<MigrationTally, anyhow::Error> {
    app_config.validate()?;
    info!("starting migration of custom dashboards");
    let strategy = resolve_run_strategy(
        &app_config.general.on_duplicate,
        std::io::stdin().is_terminal(),
    )?;
    run_migration(app_config, strategy).await
}

pub async fn run_migration(
    app_config: &AppConfig,
    strategy: DuplicateStrategy,
) -> Result<MigrationTally, anyhow::Error> {
    if strategy == DuplicateStrategy::Cancel {
        info!("migration cancelled by user, nothing was fetched or written");
        return Ok(MigrationTally::default());
    }

    let ctx = MigrationContext {
        client: HttpClient::new(
            app_config.general.verify_ssl,
            app_config.tuning.request_timeout,
            RetryPolicy::new(app_config.tuning.retry_attempts),
        )?,
        source: Backend::new(&app_config.source.url, &app_config.source.token),
        target: Backend::new(&app_config.target.url, &app_config.target.token),
        limiter: RateLimiter::new(app_config.tuning.rate_limit_per_second),
        gate: Semaphore::new(app_config.tuning.max_concurrent_requests.max(1)),
        strategy,
    };

    // Target listing is best effort: without it the run still migrates, it
    // just loses duplicate detection.
    let existing_by_title: IndexMap<String, String> =
        match list_summaries(&ctx.client, &ctx.target).await {
            Ok(summaries) => {
                let map: IndexMap<String, String> = summaries
                    .into_iter()
                    .filter_map(|summary| Some((summary.title?, summary.id?)))
                    .collect();
                info!("found {} existing dashboards in target", map.len());
                map
            }
            Err(e) => {
                warn!(
                    "could not list target dashboards, duplicate detection disabled: {:#}",
                    e
                );
                IndexMap::new()
            }
        };

    let (dashboards, prefiltered, source_total) =
        match fetch_source_dashboards(&ctx, &existing_by_title).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("error retrieving source dashboards: {:#}", e);
                return Ok(MigrationTally::default());
            }
        };

    let (source_users, target_users) = tokio::join!(
        list_users(&ctx.client, &ctx.source),
        list_users(&ctx.client, &ctx.target)
    );
    let source_users = match source_users {
        Ok(users) => users,
        Err(e) => {
            error!("could not retrieve source users, aborting migration: {:#}", e);
            return Ok(MigrationTally::default());
        }
    };
    let target_users = match target_users {
        Ok(users) => users,
        Err(e) => {
            error!("could not retrieve target users, aborting migration: {:#}", e);
            return Ok(MigrationTally {
                source: source_total,
                ..MigrationTally::default()
            });
        }
    };

    if target_users.is_empty() {
        info!("no users found in the target system, every dashboard falls back to the default owner policy");
    } else {
        // The map is built for owner correlation but is not substituted into
        // payloads; prepare_dashboard strips ownership and unmapped owners
        // fall back to the configured default owner.
        let user_map = build_user_map(&source_users, &target_users);
        info!(
            "matched {} of {} source users to target users by email",
            user_map.len(),
            source_users.len()
        );
    }
    if let Some(owner) = &app_config.general.default_owner_id {
        info!("dashboards without a mapped owner fall back to owner {}", owner);
    }

    let mut tally = MigrationTally {
        source: source_total,
        skipped: prefiltered,
        ..MigrationTally::default()
    };

    let mut prepared = Vec::with_capacity(dashboards.len());
    for dashboard in dashboards {
        match prepare_dashboard(dashboard) {
            Some(ready) => prepared.push(ready),
            None => tally.skipped += 1,
        }
    }

    for outcome in dispatch_dashboards(&ctx, prepared, &existing_by_title).await {
        tally.record(outcome);
    }

    info!(
        "migration complete: found {} source dashboards, migrated {}, updated {}, skipped {}",
        tally.source, tally.migrated, tally.updated, tally.skipped
    );
    Ok(tally)
}

async fn list_summaries(
    client: &HttpClient,
    backend: &Backend,
) -> Result<Vec<DashboardSummary>, anyhow::Error> {
    let response = client.get(backend, CUSTOM_DASHBOARDS_PATH).await?;
    Ok(response
        .error_for_status()?
        .json::<Vec<DashboardSummary>>()
        .await?)
}

async fn list_users(
    client: &HttpClient,
    backend: &Backend,
) -> Result<Vec<UserRecord>, anyhow::Error> {
    let response = client.get(backend, SHAREABLE_USERS_PATH).await?;
    Ok(response
        .error_for_status()?
        .json::<Vec<UserRecord>>()
        .await?)
}

/// Lists the source, applies smart filtering for skip mode, and resolves the
/// surviving ids to full records concurrently. Returns the fetched records,
/// the number of items excluded by filtering, and the full source count.
async fn fetch_source_dashboards(
    ctx: &MigrationContext,
    existing_by_title: &IndexMap<String, String>,
) -> Result<(Vec<DashboardRecord>, usize, usize), anyhow::Error> {
    info!("fetching custom dashboard list from source");
    let summaries = list_summaries(&ctx.client, &ctx.source).await?;
    let source_total = summaries.len();
    info!("found {} dashboards in source", source_total);

    let mut prefiltered = 0;
    let to_fetch: Vec<String> =
        if ctx.strategy == DuplicateStrategy::Skip && !existing_by_title.is_empty() {
            // Items whose title already exists will be skipped anyway, so
            // their details are never fetched.
            let kept: Vec<&DashboardSummary> = summaries
                .iter()
                .filter(|summary| {
                    !matches!(&summary.title, Some(title) if existing_by_title.contains_key(title))
                })
                .collect();
            prefiltered = source_total - kept.len();
            if prefiltered > 0 {
                info!(
                    "smart filtering: {} dashboards already exist in the target, fetching details for the remaining {}",
                    prefiltered,
                    kept.len()
                );
            }
            kept.into_iter().filter_map(|s| s.id.clone()).collect()
        } else {
            if ctx.strategy == DuplicateStrategy::Override && !existing_by_title.is_empty() {
                info!("fetching all {} dashboards (update mode)", source_total);
            }
            summaries.iter().filter_map(|s| s.id.clone()).collect()
        };

    if to_fetch.is_empty() {
        info!("no dashboards to migrate");
        return Ok((Vec::new(), prefiltered, source_total));
    }

    info!("fetching details for {} dashboards concurrently", to_fetch.len());
    let fetches = to_fetch.iter().map(|id| async move {
        let detail = fetch_dashboard_detail(ctx, id).await;
        (id, detail)
    });

    let mut dashboards = Vec::new();
    for (id, result) in join_all(fetches).await {
        match result {
            Ok(dashboard) => dashboards.push(dashboard),
            Err(e) => warn!("failed to fetch dashboard {}: {:#}", id, e),
        }
    }
    info!(
        "successfully fetched {} dashboards from source",
        dashboards.len()
    );
    Ok((dashboards, prefiltered, source_total))
}

async fn fetch_dashboard_detail(
    ctx: &MigrationContext,
    id: &str,
) -> Result<DashboardRecord, anyhow::Error> {
    let _permit = ctx.gate.acquire().await?;
    ctx.limiter.acquire().await;
    let path = format!("{}/{}", CUSTOM_DASHBOARDS_PATH, id);
    let response = ctx.client.get(&ctx.source, &path).await?;
    Ok(response
        .error_for_status()?
        .json::<DashboardRecord>()
        .await?)
}

/// Maps source user ids to target user ids by exact email match. Users with
/// a missing or empty id or email on either side are excluded.
fn build_user_map(
    source_users: &[UserRecord],
    target_users: &[UserRecord],
) -> HashMap<String, String> {
    let mut target_by_email: HashMap<&str, &str> = HashMap::new();
    for user in target_users {
        if let (Some(id), Some(email)) = (&user.id, &user.email) {
            if !id.is_empty() && !email.is_empty() {
                target_by_email.insert(email, id);
            }
        }
    }

    let mut user_map = HashMap::new();
    for user in source_users {
        if let (Some(id), Some(email)) = (&user.id, &user.email) {
            if id.is_empty() || email.is_empty() {
                continue;
            }
            if let Some(target_id) = target_by_email.get(email.as_str()) {
                user_map.insert(id.clone(), (*target_id).to_string());
            }
        }
    }
    user_map
}

/// Strips instance-local ownership, forces the one access-rule shape the
/// target persists correctly, and validates widget integrity. Returns None
/// when the dashboard must be excluded from the run.
fn prepare_dashboard(mut dashboard: DashboardRecord) -> Option<DashboardRecord> {
    let title = match dashboard.title.as_deref() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => {
            warn!("skipping dashboard with no title");
            return None;
        }
    };

    dashboard.owner = None;
    dashboard.owner_id = None;
    dashboard.access_rules = Some(vec![AccessRule::global_read_write()]);

    // The source id stays in the record: the target API requires a
    // client-supplied identifier on create.

    let widgets = match dashboard.widgets.as_deref() {
        Some(widgets) if !widgets.is_empty() => widgets,
        _ => {
            warn!("dashboard '{}' has no widgets, skipping", title);
            return None;
        }
    };
    for (index, widget) in widgets.iter().enumerate() {
        let missing = widget.missing_fields();
        if !missing.is_empty() {
            error!(
                "widget {} in dashboard '{}' is missing required fields: {}",
                index,
                title,
                missing.join(", ")
            );
            return None;
        }
    }

    Some(dashboard)
}

/// Runs create-or-update for every prepared dashboard concurrently. Each
/// task resolves to exactly one outcome; failures are folded into skips so
/// one bad item never fails the batch.
async fn dispatch_dashboards(
    ctx: &MigrationContext,
    dashboards: Vec<DashboardRecord>,
    existing_by_title: &IndexMap<String, String>,
) -> Vec<MigrationOutcome> {
    let tasks = dashboards.into_iter().map(|dashboard| async move {
        let title = dashboard.title.clone().unwrap_or_default();
        match create_or_update(ctx, dashboard, existing_by_title).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("failed to migrate dashboard '{}': {:#}", title, e);
                MigrationOutcome::Skipped
            }
        }
    });
    join_all(tasks).await
}

async fn create_or_update(
    ctx: &MigrationContext,
    dashboard: DashboardRecord,
    existing_by_title: &IndexMap<String, String>,
) -> Result<MigrationOutcome, anyhow::Error> {
    let title = dashboard.title.clone().unwrap_or_default();

    if let Some(existing_id) = existing_by_title.get(&title) {
        return match ctx.strategy {
            DuplicateStrategy::Override => {
                info!(
                    "dashboard '{}' already exists (id {}), updating",
                    title, existing_id
                );
                let _permit = ctx.gate.acquire().await?;
                ctx.limiter.acquire().await;
                update_existing(ctx, dashboard, &title, existing_id).await
            }
            _ => {
                info!(
                    "dashboard '{}' already exists (id {}), skipping",
                    title, existing_id
                );
                Ok(MigrationOutcome::Skipped)
            }
        };
    }

    let _permit = ctx.gate.acquire().await?;
    ctx.limiter.acquire().await;

    let response = ctx
        .client
        .post(&ctx.target, CUSTOM_DASHBOARDS_PATH, &dashboard)
        .await?;
    if response.status() == StatusCode::CONFLICT {
        return match ctx.strategy {
            DuplicateStrategy::Override => {
                match find_dashboard_id_by_title(ctx, &title).await {
                    Some(existing_id) => {
                        update_existing(ctx, dashboard, &title, &existing_id).await
                    }
                    None => {
                        warn!(
                            "dashboard '{}' exists but its id could not be resolved for update",
                            title
                        );
                        Ok(MigrationOutcome::Skipped)
                    }
                }
            }
            _ => {
                info!("skipped dashboard '{}', it already exists", title);
                Ok(MigrationOutcome::Skipped)
            }
        };
    }

    let created = response
        .error_for_status()?
        .json::<DashboardRecord>()
        .await?;
    let created_id = match created.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            error!("failed to create dashboard '{}': no id returned", title);
            return Ok(MigrationOutcome::Skipped);
        }
    };
    info!("created dashboard '{}' (id {})", title, created_id);
    Ok(verify_created(ctx, &title, &created_id).await)
}

async fn update_existing(
    ctx: &MigrationContext,
    mut dashboard: DashboardRecord,
    title: &str,
    existing_id: &str,
) -> Result<MigrationOutcome, anyhow::Error> {
    // The target already has its own identifier for this dashboard.
    dashboard.id = None;
    let path = format!("{}/{}", CUSTOM_DASHBOARDS_PATH, existing_id);
    let response = ctx.client.put(&ctx.target, &path, &dashboard).await?;
    response.error_for_status()?;
    info!("updated dashboard '{}' (id {})", title, existing_id);
    Ok(MigrationOutcome::Updated)
}

/// Only consulted after a create conflict, to resolve the id held by the
/// target for an already-existing title.
async fn find_dashboard_id_by_title(ctx: &MigrationContext, title: &str) -> Option<String> {
    match list_summaries(&ctx.client, &ctx.target).await {
        Ok(summaries) => summaries
            .into_iter()
            .find(|summary| summary.title.as_deref() == Some(title))
            .and_then(|summary| summary.id),
        Err(_) => None,
    }
}

/// Post-write read-back guarding a known target defect: a create can return
/// success yet persist a record whose fields are null. Such a write counts
/// as skipped, not created.
async fn verify_created(ctx: &MigrationContext, title: &str, created_id: &str) -> MigrationOutcome {
    let path = format!("{}/{}", CUSTOM_DASHBOARDS_PATH, created_id);
    match ctx.client.get(&ctx.target, &path).await {
        Ok(response) if response.status() == StatusCode::OK => {
            match response.json::<DashboardRecord>().await {
                Ok(verified) => {
                    let has_title = verified.title.as_deref().is_some_and(|t| !t.is_empty());
                    let has_widgets = verified.widgets.as_deref().is_some_and(|w| !w.is_empty());
                    if has_title && has_widgets {
                        info!("verified dashboard '{}' exists with valid data", title);
                        MigrationOutcome::Created
                    } else {
                        error!(
                            "dashboard '{}' was reported created but persisted with null fields, treating as failed",
                            title
                        );
                        MigrationOutcome::Skipped
                    }
                }
                Err(e) => {
                    warn!("could not verify dashboard '{}': {:#}", title, e);
                    MigrationOutcome::Created
                }
            }
        }
        Ok(response) => {
            warn!(
                "dashboard '{}' created but verification returned status {}",
                title,
                response.status()
            );
            MigrationOutcome::Created
        }
        Err(e) => {
            warn!("could not verify dashboard '{}': {:#}", title, e);
            MigrationOutcome::Created
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            id: (!id.is_empty()).then(|| id.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn user_map_matches_exact_emails_only() {
        let source = vec![
            user("s1", "ada@example.com"),
            user("s2", "bob@example.com"),
            user("s3", "Carol@example.com"),
        ];
        let target = vec![
            user("t1", "ada@example.com"),
            user("t2", "carol@example.com"),
        ];
        let map = build_user_map(&source, &target);
        assert_eq!(map.len(), 1);
        assert_eq!(map["s1"], "t1");
        // Email matching is case-sensitive, exactly as transmitted.
        assert!(!map.contains_key("s3"));
    }

    #[test]
    fn user_map_excludes_records_without_id_or_email() {
        let source = vec![user("", "ada@example.com"), user("s2", "")];
        let target = vec![user("t1", "ada@example.com")];
        assert!(build_user_map(&source, &target).is_empty());
    }

    fn dashboard_from(value: serde_json::Value) -> DashboardRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn prepare_strips_ownership_and_forces_global_access_rule() {
        let dashboard = dashboard_from(serde_json::json!({
            "id": "d1",
            "title": "CPU",
            "owner": {"name": "ada"},
            "ownerId": "u-1",
            "accessRules": [{"accessType": "READ", "relationType": "USER", "relatedId": "u-1"}],
            "widgets": [{"id": "w1", "width": 2, "height": 2, "config": {}}]
        }));
        let prepared = prepare_dashboard(dashboard).unwrap();
        assert!(prepared.owner.is_none());
        assert!(prepared.owner_id.is_none());
        let rules = prepared.access_rules.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].access_type.as_deref(), Some("READ_WRITE"));
        assert_eq!(rules[0].relation_type.as_deref(), Some("GLOBAL"));
        assert_eq!(rules[0].related_id.as_deref(), Some(""));
        // The source id survives: the target requires it on create.
        assert_eq!(prepared.id.as_deref(), Some("d1"));
    }

    #[test]
    fn prepare_excludes_dashboard_without_title() {
        let dashboard = dashboard_from(serde_json::json!({
            "id": "d1",
            "widgets": [{"id": "w1", "width": 1, "height": 1, "config": {}}]
        }));
        assert!(prepare_dashboard(dashboard).is_none());
    }

    #[test]
    fn prepare_excludes_dashboard_without_widgets() {
        let dashboard = dashboard_from(serde_json::json!({
            "id": "d1",
            "title": "Empty",
            "widgets": []
        }));
        assert!(prepare_dashboard(dashboard).is_none());
    }

    #[test]
    fn prepare_excludes_dashboard_with_invalid_widget() {
        let dashboard = dashboard_from(serde_json::json!({
            "id": "d1",
            "title": "Broken",
            "widgets": [
                {"id": "w1", "width": 1, "height": 1, "config": {}},
                {"id": "w2", "width": 0, "height": 1, "config": {}}
            ]
        }));
        assert!(prepare_dashboard(dashboard).is_none());
    }
}
