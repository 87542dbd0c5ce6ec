use std::sync::Arc;

use config::PaymentsConfig;
use domain::{
    DomainError, NewPayment, Payment, PaymentId, PaymentPurpose, PaymentStatus, PostId, UserId,
};

use crate::{
    blob::{validate_image, BlobStore, UploadedFile},
    clock::Clock,
    dto::PaymentView,
    error::ApplicationError,
    repository::{PaymentRepository, PostRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct SubmitProofRequest {
    pub owner: UserId,
    pub purpose: PaymentPurpose,
    pub post_id: Option<PostId>,
    pub amount: f64,
    pub proof: UploadedFile,
}

/// 收款账户，展示给需要线下转账的用户。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub bank: String,
    pub account_number: String,
    pub account_name: String,
}

pub struct PaymentServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub post_repository: Arc<dyn PostRepository>,
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
    pub payments: PaymentsConfig,
    pub max_upload_bytes: usize,
}

pub struct PaymentService {
    deps: PaymentServiceDependencies,
}

impl PaymentService {
    pub fn new(deps: PaymentServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn account_details(&self) -> AccountDetails {
        AccountDetails {
            bank: self.deps.payments.bank_name.clone(),
            account_number: self.deps.payments.account_number.clone(),
            account_name: self.deps.payments.account_name.clone(),
        }
    }

    async fn ensure_admin(&self, actor: UserId) -> Result<(), ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(actor)
            .await?
            .ok_or(ApplicationError::Authentication)?;
        if user.is_admin {
            Ok(())
        } else {
            tracing::warn!(user_id = %actor, "非管理员尝试审核付款");
            Err(ApplicationError::Authorization)
        }
    }

    pub async fn submit_proof(
        &self,
        request: SubmitProofRequest,
    ) -> Result<PaymentView, ApplicationError> {
        if let Some(post_id) = request.post_id {
            let post = self
                .deps
                .post_repository
                .find_by_id(post_id)
                .await?
                .ok_or(DomainError::PostNotFound)?;
            if post.owner_id != request.owner {
                return Err(DomainError::OperationNotAllowed.into());
            }
        }
        if request.purpose.requires_post() && request.post_id.is_none() {
            return Err(DomainError::invalid_argument("postId", "required for post payments").into());
        }

        let image = validate_image(request.proof, self.deps.max_upload_bytes)?;
        let proof_url = self.deps.blob_store.put(&image).await?;

        let payment = Payment::submit(
            PaymentId::generate(),
            NewPayment {
                owner_id: request.owner,
                post_id: request.post_id,
                purpose: request.purpose,
                amount: request.amount,
                proof_url,
            },
            self.deps.clock.now(),
        )?;
        let payment = self.deps.payment_repository.create(payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.owner_id,
            purpose = payment.purpose.as_str(),
            reference = %payment.reference,
            "收到付款凭证"
        );
        Ok(PaymentView::from(&payment))
    }

    pub async fn list_pending(&self, actor: UserId) -> Result<Vec<PaymentView>, ApplicationError> {
        self.ensure_admin(actor).await?;
        let pending = self.deps.payment_repository.list_pending().await?;
        Ok(pending.iter().map(PaymentView::from).collect())
    }

    pub async fn verify(&self, actor: UserId, id: PaymentId) -> Result<PaymentView, ApplicationError> {
        self.decide(actor, id, PaymentStatus::Verified).await
    }

    pub async fn reject(&self, actor: UserId, id: PaymentId) -> Result<PaymentView, ApplicationError> {
        self.decide(actor, id, PaymentStatus::Rejected).await
    }

    async fn decide(
        &self,
        actor: UserId,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentView, ApplicationError> {
        self.ensure_admin(actor).await?;

        let mut payment = self
            .deps
            .payment_repository
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PaymentNotFound)?;
        match status {
            PaymentStatus::Verified => payment.verify()?,
            PaymentStatus::Rejected => payment.reject()?,
            PaymentStatus::Pending => {
                return Err(DomainError::invalid_argument("status", "cannot reset to pending").into())
            }
        }

        // 读到 pending 后可能被其他管理员抢先处理
        let decided = match self.deps.payment_repository.decide(id, status).await? {
            Some(decided) => decided,
            None => {
                let current = self
                    .deps
                    .payment_repository
                    .find_by_id(id)
                    .await?
                    .ok_or(DomainError::PaymentNotFound)?;
                return Err(DomainError::PaymentAlreadyDecided {
                    status: current.status.as_str().to_owned(),
                }
                .into());
            }
        };

        tracing::info!(payment_id = %id, admin_id = %actor, status = status.as_str(), "付款已审核");
        Ok(PaymentView::from(&decided))
    }
}
