use actix_web::web;

use crate::handlers::{home::home, system::health_check};

mod auth;
mod images;
mod json_error;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);
    cfg.service(health_check);

    cfg.configure(auth::config_routes)
        .configure(images::config_routes)
        .configure(json_error::config_routes);
}
