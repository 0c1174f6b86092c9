//! Database repository for profiles.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::profiles::{Profile, ProfileCreateDBRequest, ProfileLookup, SubscriptionPatch},
    },
    types::{UserId, abbrev_uuid},
};

const PROFILE_COLUMNS: &str = "id, email, subscription_status, stripe_customer_id, current_period_start, current_period_end, \
     cancel_at_period_end, created_at, updated_at";

/// Filter for listing profiles
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub email: Option<String>,
    pub stripe_customer_id: Option<String>,
}

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Profiles<'c> {
    type CreateRequest = ProfileCreateDBRequest;
    type UpdateRequest = SubscriptionPatch;
    type Response = Profile;
    type Id = UserId;
    type Filter = ProfileFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (id, email) VALUES ($1, LOWER($2)) RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(request.id)
        .bind(&request.email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(profile)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let profile = sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            r#"
            SELECT {PROFILE_COLUMNS} FROM profiles
            WHERE ($1::text IS NULL OR LOWER(email) = LOWER($1))
              AND ($2::text IS NULL OR stripe_customer_id = $2)
            ORDER BY created_at ASC
            "#
        ))
        .bind(filter.email.as_deref())
        .bind(filter.stripe_customer_id.as_deref())
        .fetch_all(&mut *self.db)
        .await?;

        Ok(profiles)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id), status = %request.status), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = self.apply_patch("id = $8", PatchTarget::Id(id), request).await?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

enum PatchTarget<'a> {
    Id(UserId),
    Text(&'a str),
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create the profile for a freshly registered user, or return the existing one.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.id)), err)]
    pub async fn ensure(&mut self, request: &ProfileCreateDBRequest) -> Result<Profile> {
        sqlx::query("INSERT INTO profiles (id, email) VALUES ($1, LOWER($2)) ON CONFLICT DO NOTHING")
            .bind(request.id)
            .bind(&request.email)
            .execute(&mut *self.db)
            .await?;

        // A conflict on the email index leaves no row under this id
        self.get_by_id(request.id).await?.ok_or(DbError::NotFound)
    }

    /// Case-insensitive lookup by email
    #[instrument(skip_all, err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(profile)
    }

    /// Apply a billing patch to whichever profile `target` identifies, returning the number of
    /// rows written. Zero means no profile matched.
    #[instrument(skip(self, patch), fields(status = %patch.status), err)]
    pub async fn apply_subscription_patch(&mut self, target: &ProfileLookup, patch: &SubscriptionPatch) -> Result<u64> {
        match target {
            ProfileLookup::Email(email) => self.apply_patch("LOWER(email) = LOWER($8)", PatchTarget::Text(email), patch).await,
            ProfileLookup::CustomerId(customer_id) => {
                self.apply_patch("stripe_customer_id = $8", PatchTarget::Text(customer_id), patch)
                    .await
            }
        }
    }

    async fn apply_patch(&mut self, condition: &str, target: PatchTarget<'_>, patch: &SubscriptionPatch) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE profiles SET
                subscription_status = $1,
                stripe_customer_id = COALESCE($2, stripe_customer_id),
                email = COALESCE(LOWER($3), email),
                current_period_start = CASE WHEN $4 THEN $5 ELSE current_period_start END,
                current_period_end = CASE WHEN $4 THEN $6 ELSE current_period_end END,
                cancel_at_period_end = CASE WHEN $4 THEN $7 ELSE cancel_at_period_end END,
                updated_at = NOW()
            WHERE {condition}
            "#
        );

        let period = patch.period.as_ref();
        let query = sqlx::query(&sql)
            .bind(patch.status.as_str())
            .bind(patch.stripe_customer_id.as_deref())
            .bind(patch.email.as_deref())
            .bind(period.is_some())
            .bind(period.and_then(|p| p.start))
            .bind(period.and_then(|p| p.end))
            .bind(period.map(|p| p.cancel_at_period_end).unwrap_or(false));

        let query = match target {
            PatchTarget::Id(id) => query.bind(id),
            PatchTarget::Text(value) => query.bind(value),
        };

        let result = query.execute(&mut *self.db).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::profiles::BillingPeriod;
    use crate::subscription::SubscriptionStatus;
    use chrono::{TimeZone, Utc};
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn create_profile(pool: &PgPool, email: &str) -> Profile {
        let mut conn = pool.acquire().await.unwrap();
        Profiles::new(&mut conn)
            .create(&ProfileCreateDBRequest {
                id: Uuid::new_v4(),
                email: email.to_string(),
            })
            .await
            .unwrap()
    }

    fn patch(status: SubscriptionStatus) -> SubscriptionPatch {
        SubscriptionPatch {
            status,
            stripe_customer_id: None,
            email: None,
            period: None,
        }
    }

    #[sqlx::test]
    async fn test_create_defaults_to_incomplete(pool: PgPool) {
        let profile = create_profile(&pool, "New@Example.com").await;

        assert_eq!(profile.email, "new@example.com");
        assert_eq!(profile.status(), SubscriptionStatus::Incomplete);
        assert!(profile.stripe_customer_id.is_none());
        assert!(!profile.cancel_at_period_end);
    }

    #[sqlx::test]
    async fn test_ensure_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        let request = ProfileCreateDBRequest {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
        };

        let first = repo.ensure(&request).await.unwrap();
        let second = repo.ensure(&request).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.list(&ProfileFilter::default()).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn test_get_by_email_is_case_insensitive(pool: PgPool) {
        let created = create_profile(&pool, "someone@example.com").await;
        let mut conn = pool.acquire().await.unwrap();

        let found = Profiles::new(&mut conn).get_by_email("SomeOne@Example.COM").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(created.id));
    }

    #[sqlx::test]
    async fn test_patch_by_email_links_customer(pool: PgPool) {
        let created = create_profile(&pool, "buyer@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let update = SubscriptionPatch {
            status: SubscriptionStatus::Active,
            stripe_customer_id: Some("cus_123".to_string()),
            email: Some("Buyer@Example.com".to_string()),
            period: Some(BillingPeriod {
                start: Some(start),
                end: Some(end),
                cancel_at_period_end: true,
            }),
        };

        let rows = repo
            .apply_subscription_patch(&ProfileLookup::Email("BUYER@example.com".to_string()), &update)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let profile = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(profile.status(), SubscriptionStatus::Active);
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(profile.email, "buyer@example.com");
        assert_eq!(profile.current_period_start, Some(start));
        assert_eq!(profile.current_period_end, Some(end));
        assert!(profile.cancel_at_period_end);
    }

    #[sqlx::test]
    async fn test_patch_without_values_keeps_existing_fields(pool: PgPool) {
        let created = create_profile(&pool, "keep@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        let end = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        repo.update(
            created.id,
            &SubscriptionPatch {
                status: SubscriptionStatus::Active,
                stripe_customer_id: Some("cus_keep".to_string()),
                email: None,
                period: Some(BillingPeriod {
                    start: None,
                    end: Some(end),
                    cancel_at_period_end: false,
                }),
            },
        )
        .await
        .unwrap();

        // An invoice event carries neither customer linkage nor period data
        let rows = repo
            .apply_subscription_patch(
                &ProfileLookup::CustomerId("cus_keep".to_string()),
                &patch(SubscriptionStatus::PastDue),
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let profile = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(profile.status(), SubscriptionStatus::PastDue);
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_keep"));
        assert_eq!(profile.email, "keep@example.com");
        assert_eq!(profile.current_period_end, Some(end));
    }

    #[sqlx::test]
    async fn test_patch_unknown_customer_touches_nothing(pool: PgPool) {
        create_profile(&pool, "other@example.com").await;
        let mut conn = pool.acquire().await.unwrap();

        let rows = Profiles::new(&mut conn)
            .apply_subscription_patch(
                &ProfileLookup::CustomerId("cus_missing".to_string()),
                &patch(SubscriptionStatus::Active),
            )
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[sqlx::test]
    async fn test_update_missing_profile_is_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let result = Profiles::new(&mut conn)
            .update(Uuid::new_v4(), &patch(SubscriptionStatus::Active))
            .await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    async fn test_list_filters_by_customer(pool: PgPool) {
        let a = create_profile(&pool, "a@example.com").await;
        create_profile(&pool, "b@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);

        repo.update(
            a.id,
            &SubscriptionPatch {
                stripe_customer_id: Some("cus_a".to_string()),
                ..patch(SubscriptionStatus::Trialing)
            },
        )
        .await
        .unwrap();

        let found = repo
            .list(&ProfileFilter {
                stripe_customer_id: Some("cus_a".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
        assert_eq!(repo.list(&ProfileFilter::default()).await.unwrap().len(), 2);
    }
}
