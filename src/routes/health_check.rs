use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness only; does not touch the credential store.
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}
