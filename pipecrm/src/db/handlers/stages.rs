//! Database access for pipeline stages.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{errors::Result, models::stages::Stage},
    types::{PipelineId, StageId, UserId, abbrev_uuid},
};

pub struct Stages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Stages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Stages of a pipeline in board order
    #[instrument(skip(self), fields(pipeline_id = %abbrev_uuid(&pipeline_id)), err)]
    pub async fn list_for_pipeline(&mut self, pipeline_id: PipelineId) -> Result<Vec<Stage>> {
        let stages = sqlx::query_as::<_, Stage>(
            r#"
            SELECT id, pipeline_id, user_id, name, position, created_at FROM stages
            WHERE pipeline_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(stages)
    }

    /// Insert `names` at positions `0..names.len()`, skipping positions that are already taken.
    /// Returns the number of stages written.
    #[instrument(skip(self, names), fields(pipeline_id = %abbrev_uuid(&pipeline_id), count = names.len()), err)]
    pub async fn seed(&mut self, pipeline_id: PipelineId, user_id: UserId, names: &[&str]) -> Result<u64> {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO stages (pipeline_id, user_id, name, position)
            SELECT $1, $2, t.name, (t.ord - 1)::int
            FROM UNNEST($3::text[]) WITH ORDINALITY AS t(name, ord)
            ON CONFLICT (pipeline_id, position) DO NOTHING
            "#,
        )
        .bind(pipeline_id)
        .bind(user_id)
        .bind(&names)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// A stage, only if it belongs to the user
    #[instrument(skip(self), fields(stage_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_for_user(&mut self, id: StageId, user_id: UserId) -> Result<Option<Stage>> {
        let stage = sqlx::query_as::<_, Stage>(
            "SELECT id, pipeline_id, user_id, name, position, created_at FROM stages WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Pipelines;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    async fn test_seed_skips_taken_positions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = Uuid::new_v4();
        Pipelines::new(&mut conn).create_if_absent(user_id, "Pipeline").await.unwrap();
        let pipeline = Pipelines::new(&mut conn)
            .get_earliest_for_user(user_id)
            .await
            .unwrap()
            .unwrap();

        let mut repo = Stages::new(&mut conn);
        assert_eq!(repo.seed(pipeline.id, user_id, &["A", "B"]).await.unwrap(), 2);
        assert_eq!(repo.seed(pipeline.id, user_id, &["X", "Y", "C"]).await.unwrap(), 1);

        let stages = repo.list_for_pipeline(pipeline.id).await.unwrap();
        let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(stages.iter().map(|s| s.position).collect::<Vec<_>>(), [0, 1, 2]);

        assert!(repo.get_for_user(stages[0].id, user_id).await.unwrap().is_some());
        assert!(repo.get_for_user(stages[0].id, Uuid::new_v4()).await.unwrap().is_none());
    }
}
