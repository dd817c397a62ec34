use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use strata_driver::{DriverRegistry, LocalDriver};
use strata_events::{run_subscription_worker, run_webhook_worker, EventBus};
use strata_store::{MemoryStore, PostgresStore, Store};
use strata_supervisor::SupervisorConfig;

use crate::cli::{ClusterCommand, GroupCommand, InstallationCommand, SchemaCommand};
use crate::output::{render_json, render_table};

// ── Server ─────────────────────────────────────────────────────────────────

pub async fn server(bind: String, port: u16, database: String, provisioner: String) -> Result<()> {
    let store: Arc<dyn Store> = if database == "memory" {
        println!("Using in-memory (ephemeral) store");
        Arc::new(MemoryStore::new())
    } else {
        println!("Connecting to {database}");
        let pg = PostgresStore::connect(&database).await.context("failed to connect to database")?;
        pg.migrate().await.context("failed to run database migrations")?;
        Arc::new(pg)
    };

    let drivers = Arc::new(DriverRegistry::new(provisioner.clone()).register(provisioner, Arc::new(LocalDriver)));
    let events = Arc::new(EventBus::new(store.clone()));
    let config = SupervisorConfig::default();

    let nudges = strata_api::Nudges::default();

    spawn_supervisor_loops(&store, &drivers, &events, &config, &nudges);
    spawn_delivery_workers(&store);

    let token = std::env::var("STRATA_TOKEN").unwrap_or_else(|_| "strata-dev-token".to_string());
    println!("Auth token: {token}");

    let app = strata_api::build_app_with_nudges(store, drivers, events, Arc::new(token), nudges);
    let addr = format!("{bind}:{port}");
    println!("Starting strata API server on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn spawn_supervisor_loops(
    store: &Arc<dyn Store>,
    drivers: &Arc<DriverRegistry>,
    events: &Arc<EventBus>,
    config: &SupervisorConfig,
    nudges: &strata_api::Nudges,
) {
    tokio::spawn(strata_supervisor::cluster::run(store.clone(), drivers.clone(), events.clone(), config.clone(), nudges.cluster.clone()));
    tokio::spawn(strata_supervisor::installation::run(
        store.clone(),
        drivers.clone(),
        events.clone(),
        config.clone(),
        nudges.installation.clone(),
    ));
    tokio::spawn(strata_supervisor::cluster_installation::run(
        store.clone(),
        drivers.clone(),
        events.clone(),
        config.clone(),
        nudges.cluster_installation.clone(),
    ));
    tokio::spawn(strata_supervisor::group::run(store.clone(), events.clone(), config.clone(), nudges.group.clone()));

    let default_driver = drivers.default_driver().expect("default provisioner registered at startup");
    tokio::spawn(strata_supervisor::database_schema::run(
        store.clone(),
        default_driver.clone(),
        events.clone(),
        config.clone(),
        nudges.database_schema.clone(),
    ));
    tokio::spawn(strata_supervisor::backup::run(store.clone(), default_driver, events.clone(), config.clone(), nudges.backup.clone()));
}

fn spawn_delivery_workers(store: &Arc<dyn Store>) {
    let client = reqwest::Client::new();
    tokio::spawn(run_webhook_worker(store.clone(), client.clone(), Duration::from_secs(5), Duration::from_secs(10)));
    tokio::spawn(run_subscription_worker(store.clone(), client, Duration::from_secs(5), 5, Duration::from_secs(10)));
}

// ── Client helpers ───────────────────────────────────────────────────────────

fn server_url(remote: Option<String>) -> String {
    remote.unwrap_or_else(|| "http://localhost:8080".into())
}

fn resolve_token(token: Option<String>) -> Result<String> {
    token
        .or_else(|| std::env::var("STRATA_TOKEN").ok())
        .context("no token provided: pass --token or set STRATA_TOKEN")
}

fn authed_client(token: &str) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))?,
    );
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

async fn get_json(remote: Option<String>, token: Option<String>, path: &str) -> Result<serde_json::Value> {
    let token = resolve_token(token)?;
    let url = format!("{}{}", server_url(remote).trim_end_matches('/'), path);
    let resp = authed_client(&token)?.get(&url).send().await.with_context(|| format!("failed to reach {url}"))?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    if !status.is_success() {
        anyhow::bail!("{status}: {}", body.get("error").and_then(|e| e.as_str()).unwrap_or("request failed"));
    }
    Ok(body)
}

async fn post_json(
    remote: Option<String>,
    token: Option<String>,
    path: &str,
    body: serde_json::Value,
) -> Result<serde_json::Value> {
    let token = resolve_token(token)?;
    let url = format!("{}{}", server_url(remote).trim_end_matches('/'), path);
    let resp = authed_client(&token)?
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    if !status.is_success() {
        anyhow::bail!("{status}: {}", body.get("error").and_then(|e| e.as_str()).unwrap_or("request failed"));
    }
    Ok(body)
}

async fn delete_json(remote: Option<String>, token: Option<String>, path: &str) -> Result<()> {
    let token = resolve_token(token)?;
    let url = format!("{}{}", server_url(remote).trim_end_matches('/'), path);
    let resp = authed_client(&token)?.delete(&url).send().await.with_context(|| format!("failed to reach {url}"))?;
    if !resp.status().is_success() {
        anyhow::bail!("{}: delete failed", resp.status());
    }
    Ok(())
}

// ── Cluster ───────────────────────────────────────────────────────────────

pub async fn cluster(cmd: ClusterCommand, remote: Option<String>, token: Option<String>) -> Result<()> {
    match cmd {
        ClusterCommand::List => {
            let body = get_json(remote, token, "/clusters").await?;
            println!("{}", render_table(&body, &["id", "provider", "provisioner", "state"]));
        }
        ClusterCommand::Get { id } => {
            let body = get_json(remote, token, &format!("/clusters/{id}")).await?;
            println!("{}", render_json(&body));
        }
        ClusterCommand::Create { provider, provisioner } => {
            let body = post_json(remote, token, "/clusters", serde_json::json!({ "provider": provider, "provisioner": provisioner })).await?;
            println!("{}", render_json(&body));
        }
        ClusterCommand::Delete { id } => {
            delete_json(remote, token, &format!("/clusters/{id}")).await?;
            println!("deletion requested for cluster {id}");
        }
    }
    Ok(())
}

// ── Installation ─────────────────────────────────────────────────────────────

pub async fn installation(cmd: InstallationCommand, remote: Option<String>, token: Option<String>) -> Result<()> {
    match cmd {
        InstallationCommand::List => {
            let body = get_json(remote, token, "/installations").await?;
            println!("{}", render_table(&body, &["id", "owner_id", "dns", "state"]));
        }
        InstallationCommand::Get { id } => {
            let body = get_json(remote, token, &format!("/installations/{id}")).await?;
            println!("{}", render_json(&body));
        }
        InstallationCommand::Create { owner_id, dns } => {
            let body = post_json(remote, token, "/installations", serde_json::json!({ "owner_id": owner_id, "dns": dns })).await?;
            println!("{}", render_json(&body));
        }
        InstallationCommand::Delete { id } => {
            delete_json(remote, token, &format!("/installations/{id}")).await?;
            println!("deletion requested for installation {id}");
        }
        InstallationCommand::Hibernate { id } => {
            post_json(remote, token, &format!("/installations/{id}/hibernate"), serde_json::json!({})).await?;
            println!("hibernation requested for installation {id}");
        }
        InstallationCommand::Wakeup { id } => {
            post_json(remote, token, &format!("/installations/{id}/wakeup"), serde_json::json!({})).await?;
            println!("wakeup requested for installation {id}");
        }
    }
    Ok(())
}

// ── Group ───────────────────────────────────────────────────────────────────

pub async fn group(cmd: GroupCommand, remote: Option<String>, token: Option<String>) -> Result<()> {
    match cmd {
        GroupCommand::List => {
            let body = get_json(remote, token, "/groups").await?;
            println!("{}", render_table(&body, &["id", "name", "version", "max_rolling"]));
        }
        GroupCommand::Get { id } => {
            let body = get_json(remote, token, &format!("/groups/{id}")).await?;
            println!("{}", render_json(&body));
        }
        GroupCommand::Create { name, max_rolling } => {
            let body = post_json(remote, token, "/groups", serde_json::json!({ "name": name, "max_rolling": max_rolling })).await?;
            println!("{}", render_json(&body));
        }
        GroupCommand::Status { id } => {
            let body = get_json(remote, token, &format!("/groups/{id}/status")).await?;
            println!("{}", render_json(&body));
        }
        GroupCommand::Delete { id } => {
            delete_json(remote, token, &format!("/groups/{id}")).await?;
            println!("group {id} deleted");
        }
    }
    Ok(())
}

// ── Schema ───────────────────────────────────────────────────────────────────

pub async fn schema(cmd: SchemaCommand, remote: Option<String>, token: Option<String>) -> Result<()> {
    match cmd {
        SchemaCommand::Apply { logical_database_id, installation_id, name } => {
            let body = post_json(
                remote,
                token,
                "/database_schemas",
                serde_json::json!({ "logical_database_id": logical_database_id, "installation_id": installation_id, "name": name }),
            )
            .await?;
            println!("{}", render_json(&body));
        }
    }
    Ok(())
}
