use application::PaymentRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Payment, PaymentId, PaymentPurpose, PaymentStatus, PostId, RepositoryError, UserId,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{invalid_data, map_sqlx_err, Db};

const PAYMENT_COLUMNS: &str =
    "id, owner_id, post_id, purpose, proof_url, status, amount, reference, created_at";

#[derive(Debug, FromRow)]
struct PaymentRecord {
    id: Uuid,
    owner_id: Uuid,
    post_id: Option<Uuid>,
    purpose: String,
    proof_url: String,
    status: String,
    amount: f64,
    reference: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRecord> for Payment {
    type Error = RepositoryError;

    fn try_from(value: PaymentRecord) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from(value.id),
            owner_id: UserId::from(value.owner_id),
            post_id: value.post_id.map(PostId::from),
            purpose: PaymentPurpose::parse(&value.purpose)
                .map_err(|err| invalid_data(err.to_string()))?,
            proof_url: value.proof_url,
            status: PaymentStatus::parse(&value.status)
                .map_err(|err| invalid_data(err.to_string()))?,
            amount: value.amount,
            reference: value.reference,
            created_at: value.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgPaymentRepository {
    db: Db,
}

impl PgPaymentRepository {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        let sql = format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, PaymentRecord>(&sql)
                    .bind(Uuid::from(payment.id))
                    .bind(Uuid::from(payment.owner_id))
                    .bind(payment.post_id.map(Uuid::from))
                    .bind(payment.purpose.as_str())
                    .bind(&payment.proof_url)
                    .bind(payment.status.as_str())
                    .bind(payment.amount)
                    .bind(&payment.reference)
                    .bind(payment.created_at)
                    .fetch_one(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        Payment::try_from(record)
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, PaymentRecord>(&sql)
                    .bind(Uuid::from(id))
                    .fetch_optional(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        record.map(Payment::try_from).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = 'pending' ORDER BY created_at"
        );
        let records = self
            .db
            .run(async {
                sqlx::query_as::<_, PaymentRecord>(&sql)
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        records.into_iter().map(Payment::try_from).collect()
    }

    async fn decide(
        &self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError> {
        // 比较并设置：只有仍是 pending 的行会被更新
        let sql = format!(
            "UPDATE payments SET status = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, PaymentRecord>(&sql)
                    .bind(Uuid::from(id))
                    .bind(status.as_str())
                    .fetch_optional(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        record.map(Payment::try_from).transpose()
    }
}
