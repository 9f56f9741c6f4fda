//! Content backend API
//!
//! One method per backend operation. Every call goes through the shared
//! [`RequestPipeline`], so endpoint discovery, credential refresh, retry
//! and error normalization apply uniformly. Creating resources is not
//! idempotent and is therefore attempted once.

use std::sync::Arc;

use quill_core::{ApiRequest, ClientError, RequestPipeline};
use quill_domain::{
    Comment, Like, ListQuery, NewComment, NewPost, NewUser, Post, ResourceId, Role, UpdateComment,
    UpdatePost, UpdateUser, User,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

/// Typed access to posts, comments, likes and users
#[derive(Debug, Clone)]
pub struct ContentApi {
    pipeline: Arc<RequestPipeline>,
}

impl ContentApi {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.pipeline.execute_json(request).await
    }

    /// Execute and discard whatever body comes back
    async fn run(&self, request: ApiRequest) -> Result<(), ClientError> {
        let response = self.pipeline.execute(request).await?;
        debug!(status = response.status, "Request completed");
        Ok(())
    }

    /* ---------------------------------------------------------------------- */
    /* Posts */
    /* ---------------------------------------------------------------------- */

    #[instrument(skip(self))]
    pub async fn list_posts(&self, query: ListQuery) -> Result<Vec<Post>, ClientError> {
        self.fetch(ApiRequest::get("/posts").query_pairs(query.to_pairs())).await
    }

    #[instrument(skip(self))]
    pub async fn get_post(&self, id: ResourceId) -> Result<Post, ClientError> {
        self.fetch(ApiRequest::get(format!("/posts/{id}"))).await
    }

    #[instrument(skip(self, term))]
    pub async fn search_posts(&self, term: &str, query: ListQuery) -> Result<Vec<Post>, ClientError> {
        self.fetch(search("/posts/search", term, query)).await
    }

    #[instrument(skip(self, post))]
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        self.fetch(ApiRequest::post("/posts").json(post)?).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_post(&self, id: ResourceId, changes: &UpdatePost) -> Result<Post, ClientError> {
        self.fetch(ApiRequest::put(format!("/posts/{id}")).json(changes)?).await
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: ResourceId) -> Result<(), ClientError> {
        self.run(ApiRequest::delete(format!("/posts/{id}"))).await
    }

    /* ---------------------------------------------------------------------- */
    /* Comments */
    /* ---------------------------------------------------------------------- */

    #[instrument(skip(self))]
    pub async fn list_comments(
        &self,
        post_id: ResourceId,
        query: ListQuery,
    ) -> Result<Vec<Comment>, ClientError> {
        self.fetch(ApiRequest::get(format!("/posts/{post_id}/comments")).query_pairs(query.to_pairs()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_comment(&self, id: ResourceId) -> Result<Comment, ClientError> {
        self.fetch(ApiRequest::get(format!("/comments/{id}"))).await
    }

    #[instrument(skip(self, term))]
    pub async fn search_comments(
        &self,
        term: &str,
        query: ListQuery,
    ) -> Result<Vec<Comment>, ClientError> {
        self.fetch(search("/comments/search", term, query)).await
    }

    #[instrument(skip(self, comment))]
    pub async fn create_comment(
        &self,
        post_id: ResourceId,
        comment: &NewComment,
    ) -> Result<Comment, ClientError> {
        self.fetch(ApiRequest::post(format!("/posts/{post_id}/comments")).json(comment)?).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_comment(
        &self,
        id: ResourceId,
        changes: &UpdateComment,
    ) -> Result<Comment, ClientError> {
        self.fetch(ApiRequest::put(format!("/comments/{id}")).json(changes)?).await
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(&self, id: ResourceId) -> Result<(), ClientError> {
        self.run(ApiRequest::delete(format!("/comments/{id}"))).await
    }

    /* ---------------------------------------------------------------------- */
    /* Likes */
    /* ---------------------------------------------------------------------- */

    #[instrument(skip(self))]
    pub async fn list_likes(&self, post_id: ResourceId) -> Result<Vec<Like>, ClientError> {
        self.fetch(ApiRequest::get(format!("/posts/{post_id}/likes"))).await
    }

    #[instrument(skip(self))]
    pub async fn like_post(&self, post_id: ResourceId) -> Result<Like, ClientError> {
        self.fetch(ApiRequest::post(format!("/posts/{post_id}/likes"))).await
    }

    #[instrument(skip(self))]
    pub async fn unlike_post(&self, post_id: ResourceId) -> Result<(), ClientError> {
        self.run(ApiRequest::delete(format!("/posts/{post_id}/likes"))).await
    }

    /* ---------------------------------------------------------------------- */
    /* Users */
    /* ---------------------------------------------------------------------- */

    #[instrument(skip(self))]
    pub async fn list_users(&self, query: ListQuery) -> Result<Vec<User>, ClientError> {
        self.fetch(ApiRequest::get("/users").query_pairs(query.to_pairs())).await
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: ResourceId) -> Result<User, ClientError> {
        self.fetch(ApiRequest::get(format!("/users/{id}"))).await
    }

    #[instrument(skip(self, term))]
    pub async fn search_users(&self, term: &str, query: ListQuery) -> Result<Vec<User>, ClientError> {
        self.fetch(search("/users/search", term, query)).await
    }

    #[instrument(skip(self, user))]
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ClientError> {
        self.fetch(ApiRequest::post("/users").json(user)?).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_user(&self, id: ResourceId, changes: &UpdateUser) -> Result<User, ClientError> {
        self.fetch(ApiRequest::put(format!("/users/{id}")).json(changes)?).await
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: ResourceId) -> Result<(), ClientError> {
        self.run(ApiRequest::delete(format!("/users/{id}"))).await
    }

    #[instrument(skip(self))]
    pub async fn set_user_role(&self, id: ResourceId, role: Role) -> Result<User, ClientError> {
        self.fetch(ApiRequest::patch(format!("/users/{id}/role")).json(&json!({ "role": role }))?)
            .await
    }

    /// The signed-in user
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.fetch(ApiRequest::get("/users/me")).await
    }
}

fn search(path: &str, term: &str, query: ListQuery) -> ApiRequest {
    ApiRequest::get(path).query("q", term.trim()).query_pairs(query.to_pairs())
}
