//! Database Migrations
//!
//! Embedded refinery migrations from the `migrations/` directory.

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Run all pending migrations
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    tracing::info!("🔄 Running database migrations...");

    let mut client = pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;

    let report = embedded::migrations::runner()
        .run_async(&mut **client)
        .await
        .context("Failed to apply migrations")?;

    for migration in report.applied_migrations() {
        tracing::info!("  applied {}", migration);
    }
    tracing::info!("✅ Database migrations completed successfully");
    Ok(())
}

/// Check if database needs migrations
pub async fn needs_migration(pool: &Pool) -> Result<bool> {
    let client = pool.get().await?;

    let result = client
        .query_one(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'attendances'",
            &[],
        )
        .await?;

    let count: i64 = result.get(0);
    Ok(count == 0)
}
