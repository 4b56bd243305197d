use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

/// Creates the SQLite connection pool.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database...");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    info!("SQLite pool established");
    Ok(pool)
}

/// Creates the schema idempotently. `vacancy_name` is a soft reference:
/// cascade deletion is handled in the repository, not by the engine.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vacancies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT,
            phone TEXT,
            vacancy_name TEXT,
            quality_score TEXT,
            fit_score TEXT,
            total_experience TEXT,
            analysis_text TEXT,
            resume_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
