use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    dev::Server,
    web::{self, Data},
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_actix_web::TracingLogger;

use crate::challenge::ChallengeVerifier;
use crate::configuration::{DatabaseSettings, Settings};
use crate::domain::RegistrantEmail;
use crate::email_client::EmailClient;
use crate::notifications::Notifier;
use crate::routes::{health_check, home, subscribe, verify};
use crate::store::RegistrationStore;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);

        let alert_recipient = configuration
            .email_client
            .alert_recipient()
            .map_err(|e| anyhow::anyhow!("Invalid operator alert address: {e}"))?;
        let site_key = configuration.turnstile.site_key();
        let challenge_verifier = configuration.turnstile.verifier();
        let email_client = configuration.email_client.client();

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr().unwrap().port();
        let server = run(
            listener,
            connection_pool,
            email_client,
            alert_recipient,
            challenge_verifier,
            site_key,
            configuration.application.base_url,
        )?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(configuration.with_db())
}

/// Base URL used to build the verification links in outgoing emails.
pub struct ApplicationBaseUrl(pub String);

/// Turnstile site key for the landing page widget; `None` when the challenge
/// is disabled.
pub struct TurnstileSiteKey(pub Option<String>);

fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    alert_recipient: RegistrantEmail,
    challenge_verifier: Option<ChallengeVerifier>,
    site_key: Option<String>,
    base_url: String,
) -> Result<Server, anyhow::Error> {
    let store = Data::new(RegistrationStore::new(db_pool));
    let notifier = Data::new(Notifier::new(Arc::new(email_client), alert_recipient));
    let challenge_verifier = Data::new(challenge_verifier);
    let site_key = Data::new(TurnstileSiteKey(site_key));
    let base_url = Data::new(ApplicationBaseUrl(base_url));
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/", web::get().to(home))
            .route("/health_check", web::get().to(health_check))
            .route("/sub", web::post().to(subscribe))
            .route("/subscribe", web::post().to(subscribe))
            .route("/ver", web::get().to(verify))
            .route("/verify", web::get().to(verify))
            .app_data(store.clone())
            .app_data(notifier.clone())
            .app_data(challenge_verifier.clone())
            .app_data(site_key.clone())
            .app_data(base_url.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
