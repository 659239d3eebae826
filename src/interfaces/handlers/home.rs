use actix_web::{get, HttpResponse, Responder};

#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Image augmentation API",
        "status": "Ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/registration", "/login", "/upload", "/status/{task_id}", "/history/{user_id}", "/task/{task_id}", "/health"]
    }))
}
