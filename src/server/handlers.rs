//! The single HTTP ingress route: `POST /send/{actor_type}/{actor_id}/{subject}`.

use actix_web::web::{Bytes, Data, Path};
use actix_web::{post, HttpResponse};

use super::{HttpReply, ServerHandle};

/// Registers the broker's ingress route on an actix-web `App`.
///
/// Everything else (spec.md §4.4: "Anything else -> 404 Not found") falls
/// through to a plain-text 404, matching the one matched-pattern routing
/// rule exactly rather than actix-web's default empty-body 404.
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(send);
    cfg.default_service(actix_web::web::route().to(not_found));
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().body("Not found")
}

#[post("/send/{actor_type}/{actor_id}/{subject}")]
async fn send(
    path: Path<(String, String, String)>,
    body: Bytes,
    server: Data<ServerHandle>,
) -> HttpResponse {
    let (actor_type, actor_id, subject) = path.into_inner();

    // Malformed JSON never reaches the actor layer (spec.md §4.4 step 1):
    // the connection is released here with a 400, not parked.
    let value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => {
                return HttpResponse::BadRequest()
                    .content_type("application/json")
                    .body(r#"{"error":"invalid json"}"#);
            }
        }
    };

    match server.ingress(actor_type, actor_id, subject, value).await {
        Ok(HttpReply::Ok(reply)) => HttpResponse::Ok().json(reply),
        Ok(HttpReply::Error { status, body }) => {
            HttpResponse::build(status_code(status))
                .content_type("application/json")
                .body(body)
        }
        Err(_) => HttpResponse::ServiceUnavailable()
            .content_type("application/json")
            .body(r#"{"error":"broker is shutting down"}"#),
    }
}

fn status_code(status: u16) -> actix_web::http::StatusCode {
    actix_web::http::StatusCode::from_u16(status).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY)
}
