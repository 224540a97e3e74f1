use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Projection of the problem catalog; the catalog itself is owned by another
/// subsystem, this service only reads ids and titles.
#[derive(Debug, Clone, FromRow)]
pub struct ProblemTitle {
    pub id: Uuid,
    pub title: String,
}

pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM problems WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(found)
}

/// Titles for the given problem ids, returned in the order of `ids`.
/// Ids with no matching problem are silently dropped.
pub async fn titles_for(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<ProblemTitle>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, ProblemTitle>("SELECT id, title FROM problems WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(db)
        .await?;
    let mut ordered = Vec::with_capacity(rows.len());
    for id in ids {
        if let Some(row) = rows.iter().find(|r| r.id == *id) {
            ordered.push(row.clone());
        }
    }
    Ok(ordered)
}
