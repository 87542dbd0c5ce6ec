use application::UserRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Gender, PasswordHash, PhoneNumber, Profile, Rating, RatingEntry, RepositoryError, User,
    UserEmail, UserId, UserRole,
};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use super::{invalid_data, map_sqlx_err, Db};

const USER_COLUMNS: &str = "id, email, phone, password_hash, federated_id, full_name, age, \
    gender, location, role, bio, avatar, images, verified, is_online, is_admin, connections, \
    rating_average, rating_count, ratings, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
    phone: Option<String>,
    password_hash: Option<String>,
    federated_id: Option<String>,
    full_name: Option<String>,
    age: Option<i16>,
    gender: Option<String>,
    location: Option<String>,
    role: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
    images: Vec<String>,
    verified: bool,
    is_online: bool,
    is_admin: bool,
    connections: Vec<Uuid>,
    rating_average: f64,
    rating_count: i32,
    ratings: Json<Vec<RatingEntry>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let email = value
            .email
            .map(UserEmail::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let phone = value
            .phone
            .map(PhoneNumber::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let password = value
            .password_hash
            .map(PasswordHash::new)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let gender = value
            .gender
            .as_deref()
            .map(Gender::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let role = value
            .role
            .as_deref()
            .map(UserRole::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let age = value
            .age
            .map(u8::try_from)
            .transpose()
            .map_err(|_| invalid_data("age out of range"))?;

        Ok(User {
            id: UserId::from(value.id),
            email,
            phone,
            password,
            federated_id: value.federated_id,
            profile: Profile {
                full_name: value.full_name,
                age,
                gender,
                location: value.location,
                role,
                bio: value.bio,
                avatar: value.avatar,
                images: value.images,
            },
            verified: value.verified,
            is_online: value.is_online,
            is_admin: value.is_admin,
            connections: value.connections.into_iter().map(UserId::from).collect(),
            rating: Rating {
                average: value.rating_average,
                count: u32::try_from(value.rating_count).unwrap_or_default(),
                entries: value.ratings.0,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: Db,
}

impl PgUserRepository {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    async fn fetch_optional(
        &self,
        filter: &str,
        bind: impl Into<String> + Send,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter} = $1");
        let bind = bind.into();
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(bind)
                    .fetch_optional(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        record.map(User::try_from).transpose()
    }
}

fn connection_ids(user: &User) -> Vec<Uuid> {
    user.connections.iter().copied().map(Uuid::from).collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21, $22) \
             RETURNING {USER_COLUMNS}"
        );
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(Uuid::from(user.id))
                    .bind(user.email.as_ref().map(|e| e.as_str()))
                    .bind(user.phone.as_ref().map(|p| p.as_str()))
                    .bind(user.password.as_ref().map(|p| p.as_str()))
                    .bind(user.federated_id.as_deref())
                    .bind(user.profile.full_name.as_deref())
                    .bind(user.profile.age.map(i16::from))
                    .bind(user.profile.gender.map(|g| g.as_str()))
                    .bind(user.profile.location.as_deref())
                    .bind(user.profile.role.map(|r| r.as_str()))
                    .bind(user.profile.bio.as_deref())
                    .bind(user.profile.avatar.as_deref())
                    .bind(&user.profile.images)
                    .bind(user.verified)
                    .bind(user.is_online)
                    .bind(user.is_admin)
                    .bind(connection_ids(&user))
                    .bind(user.rating.average)
                    .bind(user.rating.count as i32)
                    .bind(Json(&user.rating.entries))
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .fetch_one(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        User::try_from(record)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET email = $2, phone = $3, password_hash = $4, federated_id = $5, \
                 full_name = $6, age = $7, gender = $8, location = $9, role = $10, bio = $11, \
                 avatar = $12, images = $13, verified = $14, is_admin = $15, connections = $16, \
                 rating_average = $17, rating_count = $18, ratings = $19, updated_at = $20 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        // is_online 只由在线状态跟踪器通过 set_online 修改
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(Uuid::from(user.id))
                    .bind(user.email.as_ref().map(|e| e.as_str()))
                    .bind(user.phone.as_ref().map(|p| p.as_str()))
                    .bind(user.password.as_ref().map(|p| p.as_str()))
                    .bind(user.federated_id.as_deref())
                    .bind(user.profile.full_name.as_deref())
                    .bind(user.profile.age.map(i16::from))
                    .bind(user.profile.gender.map(|g| g.as_str()))
                    .bind(user.profile.location.as_deref())
                    .bind(user.profile.role.map(|r| r.as_str()))
                    .bind(user.profile.bio.as_deref())
                    .bind(user.profile.avatar.as_deref())
                    .bind(&user.profile.images)
                    .bind(user.verified)
                    .bind(user.is_admin)
                    .bind(connection_ids(&user))
                    .bind(user.rating.average)
                    .bind(user.rating.count as i32)
                    .bind(Json(&user.rating.entries))
                    .bind(user.updated_at)
                    .fetch_one(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        User::try_from(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = self
            .db
            .run(async {
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(Uuid::from(id))
                    .fetch_optional(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        record.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        self.fetch_optional("email", email.as_str()).await
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        self.fetch_optional("phone", phone.as_str()).await
    }

    async fn find_by_federated_id(
        &self,
        subject: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_optional("federated_id", subject).await
    }

    async fn list_by_location(
        &self,
        location: &str,
        exclude: UserId,
    ) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE location = $1 AND id <> $2 \
             ORDER BY created_at"
        );
        let records = self
            .db
            .run(async {
                sqlx::query_as::<_, UserRecord>(&sql)
                    .bind(location)
                    .bind(Uuid::from(exclude))
                    .fetch_all(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        records.into_iter().map(User::try_from).collect()
    }

    async fn set_online(&self, id: UserId, online: bool) -> Result<(), RepositoryError> {
        let result = self
            .db
            .run(async {
                sqlx::query("UPDATE users SET is_online = $2 WHERE id = $1")
                    .bind(Uuid::from(id))
                    .bind(online)
                    .execute(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn reset_presence(&self) -> Result<u64, RepositoryError> {
        let result = self
            .db
            .run(async {
                sqlx::query("UPDATE users SET is_online = FALSE WHERE is_online")
                    .execute(&self.db.pool)
                    .await
                    .map_err(map_sqlx_err)
            })
            .await?;
        Ok(result.rows_affected())
    }
}
