use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use diesel::prelude::*;

use talenta_backend::{auth::password, config::AppConfig, db, schema::refresh_tokens};

const USAGE: &str = "Usage: maintenance <purge-refresh-tokens | hash-password <password>>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("purge-refresh-tokens") => purge_refresh_tokens()?,
        Some("hash-password") => {
            let Some(plain) = args.next() else {
                eprintln!("{USAGE}");
                std::process::exit(1);
            };
            println!("{}", password::hash_password(&plain)?);
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Deletes refresh tokens that are expired or were revoked.
fn purge_refresh_tokens() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let now = Utc::now().naive_utc();
    let removed = diesel::delete(
        refresh_tokens::table.filter(
            refresh_tokens::expires_at
                .le(now)
                .or(refresh_tokens::revoked_at.is_not_null()),
        ),
    )
    .execute(&mut conn)
    .context("failed to delete refresh tokens")?;

    println!("Removed {removed} refresh tokens.");
    Ok(())
}
