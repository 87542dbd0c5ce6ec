use std::collections::HashMap;

use application::{PostRepository, RecordedAcceptance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Acceptance, Post, PostContent, PostId, PostStatus, PostType, RepositoryError, Timestamp,
    UserId,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{invalid_data, map_sqlx_err, Db};

const POST_COLUMNS: &str = "id, owner_id, content, sponsored, image_url, payment_proof_url, \
    post_type, duration_days, expires_at, status, created_at";

#[derive(Debug, FromRow)]
struct PostRecord {
    id: Uuid,
    owner_id: Uuid,
    content: String,
    sponsored: bool,
    image_url: Option<String>,
    payment_proof_url: Option<String>,
    post_type: String,
    duration_days: i32,
    expires_at: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AcceptanceRecord {
    post_id: Uuid,
    user_id: Uuid,
    accepted_at: DateTime<Utc>,
}

impl PostRecord {
    fn into_post(self, acceptances: Vec<Acceptance>) -> Result<Post, RepositoryError> {
        let content = PostContent::new(self.content).map_err(|err| invalid_data(err.to_string()))?;
        let post_type =
            PostType::parse(&self.post_type).map_err(|err| invalid_data(err.to_string()))?;
        let status = PostStatus::parse(&self.status).map_err(|err| invalid_data(err.to_string()))?;
        let duration_days =
            u32::try_from(self.duration_days).map_err(|_| invalid_data("negative duration"))?;

        Ok(Post {
            id: PostId::from(self.id),
            owner_id: UserId::from(self.owner_id),
            content,
            sponsored: self.sponsored,
            image_url: self.image_url,
            payment_proof_url: self.payment_proof_url,
            post_type,
            duration_days,
            expires_at: self.expires_at,
            status,
            acceptances,
            created_at: self.created_at,
        })
    }
}

/// 批量加载接受记录并拼装帖子，保持 `records` 的顺序。
async fn hydrate(pool: &PgPool, records: Vec<PostRecord>) -> Result<Vec<Post>, RepositoryError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let rows = sqlx::query_as::<_, AcceptanceRecord>(
        r#"
        SELECT post_id, user_id, accepted_at
        FROM post_acceptances
        WHERE post_id = ANY($1)
        ORDER BY accepted_at, user_id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_err)?;

    let mut by_post: HashMap<Uuid, Vec<Acceptance>> = HashMap::new();
    for row in rows {
        by_post.entry(row.post_id).or_default().push(Acceptance {
            user_id: UserId::from(row.user_id),
            accepted_at: row.accepted_at,
        });
    }

    records
        .into_iter()
        .map(|record| {
            let acceptances = by_post.remove(&record.id).unwrap_or_default();
            record.into_post(acceptances)
        })
        .collect()
}

async fn load_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Post>, RepositoryError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
    let Some(record) = sqlx::query_as::<_, PostRecord>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_err)?
    else {
        return Ok(None);
    };
    let acceptances = sqlx::query_as::<_, AcceptanceRecord>(
        "SELECT post_id, user_id, accepted_at FROM post_acceptances \
         WHERE post_id = $1 ORDER BY accepted_at, user_id",
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(map_sqlx_err)?
    .into_iter()
    .map(|row| Acceptance {
        user_id: UserId::from(row.user_id),
        accepted_at: row.accepted_at,
    })
    .collect();
    record.into_post(acceptances).map(Some)
}

#[derive(Clone)]
pub struct PgPostRepository {
    db: Db,
}

impl PgPostRepository {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let sql = format!(
            "INSERT INTO posts ({POST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        self.db
            .run(async {
                sqlx::query(&sql)
                    .bind(Uuid::from(post.id))
                    .bind(Uuid::from(post.owner_id))
                    .bind(post.content.as_str())
                    .bind(post.sponsored)
                    .bind(post.image_url.as_deref())
                    .bind(post.payment_proof_url.as_deref())
                    .bind(post.post_type.as_str())
                    .bind(post.duration_days as i32)
                    .bind(post.expires_at)
                    .bind(post.status.as_str())
                    .bind(post.created_at)
                    .execute(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        Ok(post)
    }

    async fn extend(
        &self,
        id: PostId,
        owner: UserId,
        post_type: PostType,
        now: Timestamp,
    ) -> Result<Option<Post>, RepositoryError> {
        let sql = format!(
            "UPDATE posts SET post_type = $3, duration_days = $4, expires_at = $5 \
             WHERE id = $1 AND owner_id = $2 AND status = 'active' AND expires_at > $6 \
             RETURNING {POST_COLUMNS}"
        );
        self.db
            .run(async {
                let records = sqlx::query_as::<_, PostRecord>(&sql)
                    .bind(Uuid::from(id))
                    .bind(Uuid::from(owner))
                    .bind(post_type.as_str())
                    .bind(post_type.duration_days() as i32)
                    .bind(post_type.expires_at(now))
                    .bind(now)
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)?;
                Ok(hydrate(&self.db.pool, records).await?.pop())
            })
            .await
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        self.db
            .run(async {
                let records = sqlx::query_as::<_, PostRecord>(&sql)
                    .bind(Uuid::from(id))
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)?;
                Ok(hydrate(&self.db.pool, records).await?.pop())
            })
            .await
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<Post>, RepositoryError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE status = 'active' AND expires_at > $1 \
             ORDER BY created_at DESC"
        );
        self.db
            .run(async {
                let records = sqlx::query_as::<_, PostRecord>(&sql)
                    .bind(now)
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)?;
                hydrate(&self.db.pool, records).await
            })
            .await
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Post>, RepositoryError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE owner_id = $1 ORDER BY created_at DESC"
        );
        self.db
            .run(async {
                let records = sqlx::query_as::<_, PostRecord>(&sql)
                    .bind(Uuid::from(owner))
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)?;
                hydrate(&self.db.pool, records).await
            })
            .await
    }

    async fn count_acceptances_by(&self, user: UserId) -> Result<u64, RepositoryError> {
        let count: i64 = self
            .db
            .run(async {
                sqlx::query_scalar("SELECT COUNT(*) FROM post_acceptances WHERE user_id = $1")
                    .bind(Uuid::from(user))
                    .fetch_one(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn record_acceptance(
        &self,
        post: PostId,
        user: UserId,
        at: Timestamp,
    ) -> Result<RecordedAcceptance, RepositoryError> {
        let post_id = Uuid::from(post);
        self.db
            .run(async {
                let mut tx = self.db.pool.begin().await.map_err(map_sqlx_err)?;

                // 锁住帖子行，保证状态检查、插入与状态转换一起生效
                let locked: Option<(String, DateTime<Utc>)> = sqlx::query_as(
                    "SELECT status, expires_at FROM posts WHERE id = $1 FOR UPDATE",
                )
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                let Some((status, expires_at)) = locked else {
                    return Err(RepositoryError::NotFound);
                };

                let already: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM post_acceptances WHERE post_id = $1 AND user_id = $2)",
                )
                .bind(post_id)
                .bind(Uuid::from(user))
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                if already {
                    let current = load_in_tx(&mut tx, post_id)
                        .await?
                        .ok_or(RepositoryError::NotFound)?;
                    tx.commit().await.map_err(map_sqlx_err)?;
                    return Ok(RecordedAcceptance::Duplicate(current));
                }
                if status != PostStatus::Active.as_str() || expires_at <= at {
                    tx.rollback().await.map_err(map_sqlx_err)?;
                    return Ok(RecordedAcceptance::Closed);
                }

                sqlx::query(
                    r#"
                    INSERT INTO post_acceptances (post_id, user_id, accepted_at)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(post_id)
                .bind(Uuid::from(user))
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                sqlx::query(
                    r#"
                    UPDATE posts SET status = 'accepted'
                    WHERE id = $1
                      AND status = 'active'
                      AND EXISTS (
                          SELECT 1 FROM post_acceptances a
                          WHERE a.post_id = posts.id AND a.user_id <> posts.owner_id
                      )
                    "#,
                )
                .bind(post_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                let updated = load_in_tx(&mut tx, post_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                tx.commit().await.map_err(map_sqlx_err)?;
                Ok(RecordedAcceptance::Inserted(updated))
            })
            .await
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<PostId>, RepositoryError> {
        let ids: Vec<Uuid> = self
            .db
            .run(async {
                sqlx::query_scalar(
                    "UPDATE posts SET status = 'expired' \
                     WHERE status = 'active' AND expires_at <= $1 \
                     RETURNING id",
                )
                .bind(now)
                .fetch_all(&self.db.pool)
                .await
                .map_err(map_sqlx_err)
            })
            .await?;
        Ok(ids.into_iter().map(PostId::from).collect())
    }
}
