use actix_web::web;

use crate::handlers::images;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(images::upload)
        .service(images::task_status)
        .service(images::history)
        .service(images::download_task);
}
