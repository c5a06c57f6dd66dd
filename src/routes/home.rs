use actix_web::{HttpResponse, web};

use crate::startup::TurnstileSiteKey;

pub async fn home(site_key: web::Data<TurnstileSiteKey>) -> HttpResponse {
    let challenge_widget = match site_key.0.as_deref() {
        Some(key) => format!(
            r#"<div class="cf-turnstile" data-sitekey="{key}"></div>
<script src="https://challenges.cloudflare.com/turnstile/v0/api.js" async defer></script>"#
        ),
        None => String::new(),
    };
    HttpResponse::Ok()
        .content_type(actix_web::http::header::ContentType::html())
        .body(format!(include_str!("home.html"), challenge_widget))
}
