/// Application state shared across all routes. The pool is optional so the
/// router can be assembled without a database (health and metrics surfaces
/// stay up and report degraded readiness).
#[derive(Clone, Default)]
pub struct AppState {
    pub(crate) pool: Option<sqlx::PgPool>,
}
