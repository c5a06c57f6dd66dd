use std::sync::OnceLock;

use reqwest::Response;
use sqlx::{Connection, Executor, PgPool};
use wiremock::MockServer;

use interest_signup::configuration::{DatabaseSettings, Settings, get_configuration};
use interest_signup::startup::{Application, get_connection_pool};
use interest_signup::telemetry;

static TRACING: OnceLock<()> = OnceLock::new();

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db_pool: PgPool,
    pub email_server: MockServer,
    pub alert_email: String,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_subscribe(&self, body: String) -> Response {
        self.api_client
            .post(format!("{}/sub", &self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Failed to execute Request")
    }

    pub async fn get_home(&self) -> Response {
        self.api_client
            .get(format!("{}/", &self.address))
            .send()
            .await
            .expect("Failed to execute Request")
    }

    pub async fn get_verify(&self, query: &str) -> Response {
        self.api_client
            .get(format!("{}/verify{}", &self.address, query))
            .send()
            .await
            .expect("Failed to execute Request")
    }

    /// Requests received by the mock email provider, excluding any made to
    /// the stubbed challenge endpoint.
    pub async fn email_requests(&self) -> Vec<wiremock::Request> {
        self.email_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/email")
            .collect()
    }

    /// The post-verification notifications are sent after the response, so
    /// tests poll for them instead of asserting immediately.
    pub async fn wait_for_email_count(&self, expected: usize) {
        for _ in 0..100 {
            if self.email_requests().await.len() >= expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!(
            "Timed out waiting for {expected} emails, got {}",
            self.email_requests().await.len()
        );
    }

    pub async fn stored_registration(&self) -> (String, String, bool, bool) {
        use sqlx::Row;
        let row = sqlx::query(
            "SELECT email, token, token_verified, passed_challenge_check FROM registrations",
        )
        .fetch_one(&self.db_pool)
        .await
        .expect("Failed to fetch the stored registration");
        (
            row.get("email"),
            row.get("token"),
            row.get("token_verified"),
            row.get("passed_challenge_check"),
        )
    }

    pub async fn registration_count(&self) -> i64 {
        sqlx::query_scalar("SELECT count(*) FROM registrations")
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to count registrations")
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
    TRACING.get_or_init(|| {
        if std::env::var("TEST_LOG").is_ok() {
            let subscriber =
                telemetry::get_subscriber("test".into(), "debug".into(), std::io::stdout);
            telemetry::init_subscriber(subscriber);
        } else {
            let subscriber =
                telemetry::get_subscriber("test".into(), "debug".into(), std::io::sink);
            telemetry::init_subscriber(subscriber);
        }
    });

    let email_server = MockServer::start().await;

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");

        c.database.database_name = uuid::Uuid::new_v4().to_string();
        c.application.port = 0;
        c.email_client.base_url = email_server.uri();
        // The same mock server stands in for the challenge provider.
        c.turnstile.enabled = false;
        c.turnstile.verify_url = format!("{}/siteverify", email_server.uri());
        customise(&mut c);
        c
    };

    configure_database(&configuration.database).await;

    let application = Application::build(configuration.clone())
        .await
        .expect("Failed to build application");
    let port = application.port();
    let address = format!("http://127.0.0.1:{port}");

    _ = tokio::spawn(application.run_until_stopped());

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        port,
        db_pool: get_connection_pool(&configuration.database),
        email_server,
        alert_email: configuration.email_client.alert_email,
        api_client,
    }
}

async fn configure_database(config: &DatabaseSettings) -> sqlx::PgPool {
    let mut connection = sqlx::PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to postgres instance");

    connection
        .execute(format!(r#"CREATE DATABASE "{}""#, config.database_name,).as_str())
        .await
        .expect("Failed to create new database");

    let db_pool = sqlx::PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run migrations");

    db_pool
}

pub struct ConfirmationLinks {
    pub html_link: reqwest::Url,
    pub plain_link: reqwest::Url,
}

impl ConfirmationLinks {
    pub fn get_confirmation_link(request: &wiremock::Request, port: u16) -> ConfirmationLinks {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();

        let get_link = |s: &str| {
            let links: Vec<_> = linkify::LinkFinder::new()
                .links(s)
                .filter(|l| *l.kind() == linkify::LinkKind::Url)
                .collect();
            // The HTML body repeats the link as the anchor text.
            assert!(!links.is_empty());
            assert!(links.windows(2).all(|w| w[0].as_str() == w[1].as_str()));
            let link = links[0].as_str().to_owned();
            let mut link = reqwest::Url::parse(&link).unwrap();
            link.set_port(Some(port)).unwrap();
            //Please do not send stuff outside localhost
            assert_eq!(link.host_str().unwrap(), "127.0.0.1");
            link
        };

        ConfirmationLinks {
            html_link: get_link(body["HtmlBody"].as_str().unwrap()),
            plain_link: get_link(body["TextBody"].as_str().unwrap()),
        }
    }
}
