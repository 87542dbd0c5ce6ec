use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{PasswordHash, PhoneNumber, Timestamp, UserEmail, UserId};

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 99;
pub const MAX_BIO_CHARS: usize = 300;
pub const MAX_PROFILE_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(DomainError::invalid_argument("gender", "unknown gender")),
        }
    }
}

/// 用户在平台上寻找的关系类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Friends,
    Dates,
    Companions,
    Escort,
    Networking,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Friends => "friends",
            UserRole::Dates => "dates",
            UserRole::Companions => "companions",
            UserRole::Escort => "escort",
            UserRole::Networking => "networking",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "friends" => Ok(UserRole::Friends),
            "dates" => Ok(UserRole::Dates),
            "companions" => Ok(UserRole::Companions),
            "escort" => Ok(UserRole::Escort),
            "networking" => Ok(UserRole::Networking),
            _ => Err(DomainError::invalid_argument("role", "unknown role")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub role: Option<UserRole>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub images: Vec<String>,
}

/// 资料的部分更新，只应用出现的字段。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub role: Option<UserRole>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub images: Option<Vec<String>>,
    pub email: Option<UserEmail>,
    pub phone: Option<PhoneNumber>,
}

impl ProfilePatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err(DomainError::invalid_argument("fullName", "cannot be empty"));
            }
        }
        if let Some(age) = self.age {
            if !(MIN_AGE..=MAX_AGE).contains(&age) {
                return Err(DomainError::invalid_argument(
                    "age",
                    "must be between 18 and 99",
                ));
            }
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_CHARS {
                return Err(DomainError::invalid_argument(
                    "bio",
                    "cannot exceed 300 characters",
                ));
            }
        }
        if let Some(images) = &self.images {
            if images.len() > MAX_PROFILE_IMAGES {
                return Err(DomainError::invalid_argument(
                    "images",
                    "at most 5 images are allowed",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub rater: UserId,
    pub value: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
    pub entries: Vec<RatingEntry>,
}

impl Rating {
    /// 每个评分人只保留一条记录，重复评分覆盖旧值。
    pub fn submit(&mut self, rater: UserId, value: u8) -> Result<f64, DomainError> {
        if !(1..=5).contains(&value) {
            return Err(DomainError::invalid_argument(
                "rating",
                "Rating must be between 1 and 5",
            ));
        }
        match self.entries.iter_mut().find(|entry| entry.rater == rater) {
            Some(entry) => entry.value = value,
            None => self.entries.push(RatingEntry { rater, value }),
        }
        let total: u32 = self.entries.iter().map(|entry| u32::from(entry.value)).sum();
        self.count = self.entries.len() as u32;
        self.average = f64::from(total) / f64::from(self.count);
        Ok(self.average)
    }
}

/// 对外可见的用户摘要（聊天对象、推送载荷）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: Option<String>,
    #[serde(rename = "profilePicture")]
    pub avatar: Option<String>,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<UserEmail>,
    pub phone: Option<PhoneNumber>,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: Option<PasswordHash>,
    pub federated_id: Option<String>,
    pub profile: Profile,
    pub verified: bool,
    pub is_online: bool,
    pub is_admin: bool,
    pub connections: Vec<UserId>,
    pub rating: Rating,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn signup(
        id: UserId,
        email: UserEmail,
        phone: PhoneNumber,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            email: Some(email),
            phone: Some(phone),
            password: Some(password),
            federated_id: None,
            profile: Profile::default(),
            verified: false,
            is_online: false,
            is_admin: false,
            connections: Vec::new(),
            rating: Rating::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 第三方登录首次创建的用户，身份已由外部校验。
    pub fn federated(
        id: UserId,
        subject: impl Into<String>,
        email: Option<UserEmail>,
        name: Option<String>,
        picture: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            email,
            phone: None,
            password: None,
            federated_id: Some(subject.into()),
            profile: Profile {
                full_name: name,
                avatar: picture,
                ..Profile::default()
            },
            verified: true,
            is_online: false,
            is_admin: false,
            connections: Vec::new(),
            rating: Rating::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn link_federated(&mut self, subject: impl Into<String>, now: Timestamp) {
        self.federated_id = Some(subject.into());
        self.verified = true;
        self.updated_at = now;
    }

    pub fn apply_patch(&mut self, patch: ProfilePatch, now: Timestamp) -> Result<(), DomainError> {
        patch.validate()?;
        let ProfilePatch {
            full_name,
            age,
            gender,
            location,
            role,
            bio,
            avatar,
            images,
            email,
            phone,
        } = patch;

        if let Some(full_name) = full_name {
            self.profile.full_name = Some(full_name.trim().to_owned());
        }
        if age.is_some() {
            self.profile.age = age;
        }
        if gender.is_some() {
            self.profile.gender = gender;
        }
        if location.is_some() {
            self.profile.location = location;
        }
        if role.is_some() {
            self.profile.role = role;
        }
        if bio.is_some() {
            self.profile.bio = bio;
        }
        if avatar.is_some() {
            self.profile.avatar = avatar;
        }
        if let Some(images) = images {
            self.profile.images = images;
        }
        if email.is_some() {
            self.email = email;
        }
        if phone.is_some() {
            self.phone = phone;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn rate(&mut self, rater: UserId, value: u8, now: Timestamp) -> Result<f64, DomainError> {
        if rater == self.id {
            return Err(DomainError::invalid_argument(
                "rating",
                "You cannot rate yourself",
            ));
        }
        let average = self.rating.submit(rater, value)?;
        self.updated_at = now;
        Ok(average)
    }

    /// 没有填写姓名视为新用户，需要先完善资料。
    pub fn profile_incomplete(&self) -> bool {
        self.profile
            .full_name
            .as_deref()
            .map(|name| name.trim().is_empty())
            .unwrap_or(true)
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            name: self.profile.full_name.clone(),
            avatar: self.profile.avatar.clone(),
            is_online: self.is_online,
        }
    }
}
