use actix_cors::Cors;

pub fn create_cors() -> Cors {
    // auth is bearer-token based, no cookies, so a wildcard origin is fine
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
