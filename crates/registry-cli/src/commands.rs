//! Subcommand implementations.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use profile_registry::{
    filter_by_status, AppendOutcome, DecryptOutcome, Ed25519Signer, NewProfile, Profile,
    Registry, RegistryError, Status,
};
use serde::Serialize;
use std::future::Future;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("Failed to render JSON")?
            );
        } else {
            human();
        }
        Ok(())
    }
}

/// Run `operation` while echoing registry progress to stderr.
async fn with_progress<T>(registry: &Registry, operation: impl Future<Output = T>) -> T {
    let mut rx = registry.subscribe();

    let watcher = async {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            eprintln!("{}", status.message());
            if status.is_terminal() {
                break;
            }
        }
    };

    let (result, ()) = tokio::join!(operation, watcher);
    result
}

fn format_time(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn print_profile(profile: &Profile) {
    println!(
        "{:<24} {:<10} {:<16} {:<17} {}",
        profile.id,
        profile.status,
        profile.category,
        format_time(profile.timestamp),
        profile.owner
    );
}

pub async fn list(registry: &Registry, status: Option<Status>, out: Output) -> Result<()> {
    let profiles = registry.list().await.context("Failed to list profiles")?;
    let profiles = filter_by_status(&profiles, status);

    out.print(&profiles, || {
        if profiles.is_empty() {
            println!("No creator profiles found");
        }
        for profile in &profiles {
            print_profile(profile);
        }
    })
}

pub async fn stats(registry: &Registry, out: Output) -> Result<()> {
    let stats = registry.stats().await.context("Failed to load profiles")?;

    out.print(&stats, || {
        println!("Total:    {}", stats.total);
        println!("Verified: {}", stats.verified);
        println!("Pending:  {}", stats.pending);
        println!("Rejected: {}", stats.rejected);
    })
}

pub async fn show(registry: &Registry, id: &str, out: Output) -> Result<()> {
    let profile = registry.get(id).await?;

    out.print(&profile, || {
        println!("Id:       {}", profile.id);
        println!("Category: {}", profile.category);
        println!("Status:   {}", profile.status);
        println!("Owner:    {}", profile.owner);
        println!("Created:  {}", format_time(profile.timestamp));
        println!("Revenue:  {}", profile.encrypted_revenue);
        println!("Rating:   {}", profile.encrypted_rating);
    })
}

pub async fn create(
    registry: &Registry,
    category: String,
    revenue: f64,
    rating: f64,
    owner: String,
    out: Output,
) -> Result<()> {
    let new = NewProfile::new(category, revenue, rating, owner);
    match with_progress(registry, registry.submit(new)).await {
        Ok(profile) => out.print(&profile, || print_profile(&profile)),
        Err(RegistryError::IndexAppendFailed { id, source }) => Err(anyhow::anyhow!(
            "profile {} was stored but not listed ({}); run `registry-cli reindex {}`",
            id,
            source,
            id
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn set_status(
    registry: &Registry,
    id: &str,
    next: Status,
    caller: &str,
    out: Output,
) -> Result<()> {
    let profile = match next {
        Status::Verified => with_progress(registry, registry.verify(id, caller)).await?,
        Status::Rejected => with_progress(registry, registry.reject(id, caller)).await?,
        Status::Pending => anyhow::bail!("profiles cannot be moved back to pending"),
    };

    out.print(&profile, || print_profile(&profile))
}

pub async fn reindex(registry: &Registry, id: &str) -> Result<()> {
    match registry.retry_index(id).await? {
        AppendOutcome::Appended { attempts } => {
            println!("Indexed {} after {} attempt(s)", id, attempts)
        }
        AppendOutcome::AlreadyPresent => println!("{} is already indexed", id),
    }
    Ok(())
}

pub async fn decrypt(
    registry: &Registry,
    id: &str,
    signer: &Ed25519Signer,
    out: Output,
) -> Result<()> {
    match with_progress(registry, registry.decrypt(id, signer)).await? {
        DecryptOutcome::Revealed(values) => {
            let json = serde_json::json!({
                "id": id,
                "revenue": values.revenue,
                "rating": values.rating,
            });
            out.print(&json, || {
                let show = |v: Option<f64>| v.map_or("unavailable".to_string(), |v| v.to_string());
                println!("Revenue: {}", show(values.revenue));
                println!("Rating:  {}", show(values.rating));
            })
        }
        DecryptOutcome::Withheld { reason } => {
            anyhow::bail!("values withheld: {}", reason)
        }
    }
}

pub async fn challenge(registry: &Registry, id: Option<&str>, signer: &Ed25519Signer) -> Result<()> {
    let gate = registry.gate().await;
    let message = match id {
        Some(id) => gate.challenge_for(&registry.get(id).await?),
        None => gate.session().challenge(),
    };

    println!("{}", message);
    eprintln!("Signer: {}", signer.verifying_key_hex());
    Ok(())
}
