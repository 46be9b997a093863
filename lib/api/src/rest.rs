use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use featsim_core::Error;
use featsim_similarity::SimilarityPipeline;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_LIMIT: usize = 10;

#[derive(Deserialize)]
struct SimilarQuery {
    limit: Option<usize>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(pipeline: Arc<SimilarityPipeline>, port: u16) -> std::io::Result<()> {
        info!(port, "Starting REST API");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(pipeline.clone()))
                .configure(configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Register the similarity routes. Expects `web::Data<Arc<SimilarityPipeline>>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(status))
        .route("/rebuild", web::post().to(rebuild))
        .route("/similar/{id}", web::get().to(similar))
        .route("/pairs/{a}/{b}", web::get().to(explain));
}

fn error_response(e: &Error) -> HttpResponse {
    let body = serde_json::json!({
        "error": e.to_string()
    });
    match e {
        Error::RelationNotFound(_) => HttpResponse::NotFound().json(body),
        Error::Configuration(_) => HttpResponse::BadRequest().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

async fn status(pipeline: web::Data<Arc<SimilarityPipeline>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "state": pipeline.state(),
        "model": pipeline.model().name(),
        "output_relation": pipeline.config().output_relation().to_string()
    })))
}

async fn rebuild(pipeline: web::Data<Arc<SimilarityPipeline>>) -> ActixResult<HttpResponse> {
    let pipeline = pipeline.get_ref().clone();
    let outcome = web::block(move || pipeline.run()).await;

    match outcome {
        Ok(Ok(report)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": report
        }))),
        Ok(Err(e)) => Ok(error_response(&e)),
        Err(e) => {
            error!(error = %e, "Rebuild task did not complete");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Rebuild task did not complete"
            })))
        }
    }
}

async fn similar(
    pipeline: web::Data<Arc<SimilarityPipeline>>,
    path: web::Path<String>,
    query: web::Query<SimilarQuery>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

    // a missing output relation surfaces as RelationNotFound (404); a concept
    // with no neighbours is an empty list
    match pipeline.similar_to(&id, limit) {
        Ok(items) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": items
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn explain(
    pipeline: web::Data<Arc<SimilarityPipeline>>,
    path: web::Path<(String, String)>,
) -> ActixResult<HttpResponse> {
    let (a, b) = path.into_inner();

    match pipeline.explain(&a, &b) {
        Ok(Some(explanation)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": explanation
        }))),
        Ok(None) => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Pair ({}, {}) not found", a, b)
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}
