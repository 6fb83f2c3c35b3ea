//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::BudgetConfig;

use super::open_db;

/// Comma-separated values from an environment variable, blanks dropped
fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    sign_in_path: &str,
    budget: BudgetConfig,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    println!("   Daily spending target: {}", budget.target_daily_spending);

    // API keys from environment (comma-separated)
    let api_keys = env_list("TALLY_API_KEYS");

    // Trusted networks (for local network access without a proxy session)
    let trusted_networks_str = std::env::var("TALLY_TRUSTED_NETWORKS").unwrap_or_default();
    let trusted_networks = tally_server::parse_trusted_networks(&trusted_networks_str);

    // Trusted proxies (for extracting real client IP behind reverse proxies)
    let trusted_proxies_str = std::env::var("TALLY_TRUSTED_PROXIES").unwrap_or_default();
    let trusted_proxies = tally_server::parse_trusted_networks(&trusted_proxies_str);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: identity proxy (X-Auth-Request-Email)");
        println!("      Signed-out visitors are sent to {}", sign_in_path);
        if !api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured (TALLY_API_KEYS)",
                api_keys.len()
            );
        }
        if !trusted_networks.is_empty() {
            println!(
                "   🏠 Trusted networks: {} (TALLY_TRUSTED_NETWORKS)",
                trusted_networks
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if !trusted_proxies.is_empty() {
            println!(
                "   🔀 Trusted proxies: {} (TALLY_TRUSTED_PROXIES)",
                trusted_proxies
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = tally_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
        trusted_networks,
        trusted_proxies,
        sign_in_path: sign_in_path.to_string(),
        budget,
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("Static directory path must be valid UTF-8"))
        .transpose()?;
    tally_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
