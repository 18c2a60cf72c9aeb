// SPDX-License-Identifier: Apache-2.0

//! Prints the access report of a user as JSON.
//!
//! Usage: `access-engine <user-id> [class-id]`, with `DATABASE_URL` pointing
//! at the application database.

use std::process::ExitCode;
use std::sync::Arc;

use access_engine::grants::PgStore;
use access_engine::{observability, AccessConfig, AccessError, AccessService};

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_tracing(&observability::log_directory());

    match run().await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "access-engine failed");
            eprintln!("error: {e}");
            if e.is_not_found() {
                ExitCode::from(4)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> Result<String, AccessError> {
    let mut args = std::env::args().skip(1);
    let user_id = args
        .next()
        .ok_or_else(|| AccessError::config("usage: access-engine <user-id> [class-id]"))?;
    let class_id = args
        .next()
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| AccessError::config(format!("class id must be numeric, got {raw:?}")))
        })
        .transpose()?;

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| AccessError::config("DATABASE_URL is not set"))?;
    let config = AccessConfig::from_env()?;
    let store = Arc::new(PgStore::connect(&database_url, None).await?);
    let service = AccessService::from_store(store, config);

    let json = match class_id {
        Some(class_id) => {
            serde_json::to_string_pretty(&service.resolve_class_access(&user_id, class_id).await?)
        }
        None => {
            let summary = service.access_summary(&user_id).await?;
            let classes = service.resolve_all_accessible_classes(&user_id).await?;
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": summary,
                "classes": classes,
            }))
        }
    };
    json.map_err(|e| AccessError::config(format!("Failed to serialize report: {e}")))
}
