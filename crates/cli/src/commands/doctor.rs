//! `clawcraft doctor` — diagnose configuration and storage health.

use clawcraft_store::SqliteStore;
use std::path::PathBuf;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut problems = 0u32;

    println!("clawcraft doctor");

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  [ok] configuration loads and validates");
            Some(config)
        }
        Err(e) => {
            println!("  [!!] configuration: {e}");
            problems += 1;
            None
        }
    };

    if let Some(config) = &config {
        match config.require_api_key() {
            Ok(_) => println!("  [ok] LLM API key present"),
            Err(_) => {
                println!("  [!!] LLM API key missing (set llm.api_key or CLAWCRAFT_API_KEY)");
                problems += 1;
            }
        }

        match SqliteStore::open(&config.storage.path).await {
            Ok(_) => println!("  [ok] storage opens at {}", config.storage.path),
            Err(e) => {
                println!("  [!!] storage: {e}");
                problems += 1;
            }
        }
    }

    if problems == 0 {
        println!("All checks passed.");
        Ok(())
    } else {
        Err(format!("{problems} problem(s) found").into())
    }
}
