//! `skylog doctor`: diagnose configuration, database and provider.

use skylog_config::AppConfig;
use skylog_core::store::FlightStore;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("skylog doctor: system diagnostics");
    println!("=================================\n");

    let mut issues = 0;

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("         Falling back to defaults for the remaining checks");
            issues += 1;
            AppConfig::default()
        }
    };

    if config.has_api_key() || config.provider == "ollama" {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key: set SKYLOG_API_KEY or api_key in config.toml");
        issues += 1;
    }

    match super::open_store(&config).await {
        Ok(store) => match store.list_tables().await {
            Ok(tables) => println!(
                "  [ok]   Database reachable at {} ({} tables)",
                config.store.path,
                tables.len()
            ),
            Err(e) => {
                println!("  [fail] Database query failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Cannot open database: {e}");
            issues += 1;
        }
    }

    match skylog_providers::build_from_config(&config) {
        Ok(provider) => {
            match tokio::time::timeout(Duration::from_secs(10), provider.health_check()).await {
                Ok(Ok(true)) => println!("  [ok]   Provider '{}' reachable", provider.name()),
                Ok(Ok(false)) => {
                    println!("  [warn] Provider '{}' answered but rejected the request", provider.name());
                    issues += 1;
                }
                Ok(Err(e)) => {
                    println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
                Err(_) => {
                    println!("  [fail] Provider '{}' timed out", provider.name());
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  [fail] Provider not configured: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
