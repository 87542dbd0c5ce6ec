//! HTTP 与 WebSocket 接口层。

mod auth;
mod chat_routes;
mod error;
mod extract;
mod payment_routes;
mod post_routes;
mod routes;
mod state;
mod upload;
mod user_routes;
mod websocket;

pub use auth::{AuthUser, Claims, JwtService, LoginResponse};
pub use config::JwtConfig;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::{AppState, AppStateDependencies};
