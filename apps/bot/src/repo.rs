//! Repository: the single home for every store operation. Handlers never run
//! inline queries.

use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct VacancyRow {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Canonical field order: quality before fit, everywhere.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub vacancy_name: String,
    pub quality_score: String,
    pub fit_score: String,
    pub total_experience: String,
    pub analysis_text: String,
    pub resume_url: String,
}

#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub full_name: String,
    pub phone: String,
    pub vacancy_name: String,
    pub quality_score: String,
    pub fit_score: String,
    pub total_experience: String,
    pub analysis_text: String,
    pub resume_url: String,
}

/// Saves or overwrites a vacancy by its unique name.
pub async fn upsert_vacancy(
    pool: &SqlitePool,
    name: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO vacancies (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_vacancy_names(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM vacancies ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

pub async fn find_vacancy_by_prefix(
    pool: &SqlitePool,
    prefix: &str,
) -> Result<Option<VacancyRow>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, description FROM vacancies WHERE name LIKE ? LIMIT 1")
        .bind(format!("{prefix}%"))
        .fetch_optional(pool)
        .await
}

pub async fn insert_candidate(
    pool: &SqlitePool,
    candidate: &NewCandidate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO candidates
            (full_name, phone, vacancy_name, quality_score, fit_score,
             total_experience, analysis_text, resume_url)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&candidate.full_name)
    .bind(&candidate.phone)
    .bind(&candidate.vacancy_name)
    .bind(&candidate.quality_score)
    .bind(&candidate.fit_score)
    .bind(&candidate.total_experience)
    .bind(&candidate.analysis_text)
    .bind(&candidate.resume_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_candidates_by_vacancy_prefix(
    pool: &SqlitePool,
    prefix: &str,
) -> Result<Vec<CandidateRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, full_name, phone, vacancy_name, quality_score, fit_score,
               total_experience, analysis_text, resume_url
        FROM candidates
        WHERE vacancy_name LIKE ?
        ORDER BY id
        "#,
    )
    .bind(format!("{prefix}%"))
    .fetch_all(pool)
    .await
}

/// Resolves the full vacancy name by prefix, deletes its candidates, then the
/// vacancy row itself. Candidates under other vacancy names stay untouched.
pub async fn delete_vacancy_and_candidates(
    pool: &SqlitePool,
    prefix: &str,
) -> Result<(), sqlx::Error> {
    let Some(vacancy) = find_vacancy_by_prefix(pool, prefix).await? else {
        return Ok(());
    };

    sqlx::query("DELETE FROM candidates WHERE vacancy_name = ?")
        .bind(&vacancy.name)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM vacancies WHERE name = ?")
        .bind(&vacancy.name)
        .execute(pool)
        .await?;
    Ok(())
}
