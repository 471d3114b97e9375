use clap::{arg, Command};
use dotenv::dotenv;
use log::{error, info};
use server::config::{parse_port, ServerConfig};
use server::store::Store;

#[tokio::main]
async fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    dotenv().ok();
    env_logger::init();

    let matches = Command::new("server")
        .version("0.1.0")
        .about("Mock chat API for CLT chatbot frontend development")
        .arg(arg!(host: --host <HOST> "Address to bind, defaults to all interfaces"))
        .arg(arg!(port: --port <PORT> "Port to bind"))
        .get_matches();

    let mut config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.set_host(host.clone());
    }
    if let Some(port) = matches.get_one::<String>("port") {
        match parse_port(port) {
            Ok(port) => config.set_port(port),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let app = server::app(Store::seeded().into_shared(), config.cors_layer());
    let addr = config.bind_address();

    info!("Starting server at {}", addr);

    let listener = match tokio::net::TcpListener::bind((config.host(), config.port())).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server terminated: {}", e);
        std::process::exit(1);
    }
}
