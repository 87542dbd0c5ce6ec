mod auth_service;
mod chat_service;
mod payment_service;
mod post_service;
mod user_service;

pub use auth_service::{
    AuthService, AuthServiceDependencies, AuthenticatedUser, LoginRequest, SignupRequest,
};
pub use chat_service::{ChatService, ChatServiceDependencies, SendMessageRequest, StartChatRequest};
pub use payment_service::{
    AccountDetails, PaymentService, PaymentServiceDependencies, SubmitProofRequest,
};
pub use post_service::{
    AcceptPostRequest, CreatePostRequest, ExtendPostRequest, PostService, PostServiceDependencies,
    FREE_ACCEPTANCE_QUOTA,
};
pub use user_service::{UserService, UserServiceDependencies, AVATAR_FIELD, IMAGES_FIELD};
