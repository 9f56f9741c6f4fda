//! Resource types exchanged with the content backend
//!
//! All types use camelCase on the wire. Identifiers are the backend's
//! integer primary keys.

pub mod auth;
pub mod comment;
pub mod like;
pub mod post;
pub mod query;
pub mod user;

pub use auth::{AuthSession, LoginRequest, RegisterRequest};
pub use comment::{Comment, NewComment, UpdateComment};
pub use like::Like;
pub use post::{NewPost, Post, UpdatePost};
pub use query::ListQuery;
pub use user::{NewUser, Role, UpdateUser, User, UserSummary};

/// Backend primary key
pub type ResourceId = i64;
