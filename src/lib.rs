//! A serverless-actor message broker: HTTP messages are routed to
//! per-address mailboxes, each backed by an AWS Lambda function invoked
//! with SigV4-signed requests. Credentials are either supplied statically
//! or bootstrapped from the EC2 instance metadata service.

pub mod address;
pub mod aws;
pub mod config;
pub mod envelope;
pub mod error;
pub mod mailbox;
pub mod net;
pub mod server;

use std::net::IpAddr;

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

use aws::AwsClient;
use config::Config;
use error::Error;
use server::{handlers, ServerActor, ServerHandle};

fn init_tracing() -> eyre::Result<()> {
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("MQLESS_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("MQLESS_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    Ok(())
}

/// Resolves the address the broker advertises as its own endpoint: the
/// EC2 private IP when credentials came from IMDS, otherwise whatever
/// local interface would reach the public internet.
async fn resolve_endpoint(http: &reqwest::Client, used_imds: bool) -> IpAddr {
    if used_imds {
        if let Some(ip) = aws::imds_private_ip(http).await {
            return ip;
        }
    }
    net::local_interface_ip().unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

/// Builds the AWS client (bootstrapping credentials from IMDS if none were
/// configured statically), spawns the server actor, and runs the HTTP
/// listener until shutdown.
pub async fn run(config: Config) -> eyre::Result<()> {
    init_tracing()?;

    let http = reqwest::Client::builder()
        .build()
        .expect("reqwest client with rustls-tls always builds");

    let mut aws = AwsClient::new(http.clone(), config.aws_endpoint().cloned(), config.aws_role().to_owned());

    let used_imds = match config.static_credentials() {
        Some((region, access_key, secret)) => {
            aws.configure_static(access_key, secret, region);
            false
        }
        None => {
            if aws.refresh_credentials_sync().await.is_err() {
                return Err(Error::CredentialBootstrap.into());
            }
            true
        }
    };

    let endpoint = resolve_endpoint(&http, used_imds).await;
    let port = config.port();
    tracing::info!(
        %endpoint,
        port,
        region = aws.region().unwrap_or("unknown"),
        "publishing broker endpoint http://{endpoint}:{port}"
    );

    let server_handle: ServerHandle = ServerActor::spawn(aws, used_imds);
    let data = Data::new(server_handle);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(handlers::configure))
        .workers(1)
        .bind(("0.0.0.0", port))
        .map_err(|source| Error::Bind { port, source })?
        .run()
        .await?;

    Ok(())
}
