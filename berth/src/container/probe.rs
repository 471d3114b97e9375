use log::debug;
use std::net::TcpListener;
use std::time::Duration;

/// Fails if something on this host already listens on `port`.
pub fn ensure_port_available(port: u16) -> Result<(), String> {
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("Host port {} is not available: {}", port, e)),
    }
}

/// GETs `url` until it answers 2xx, giving up after `attempts` tries spaced
/// `delay` apart. Returns the final status code.
pub async fn probe(url: &str, attempts: u32, delay: Duration) -> Result<u16, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| e.to_string())?;

    let mut last_error = format!("{} was never probed", url);
    for attempt in 1..=attempts.max(1) {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                return Ok(response.status().as_u16());
            }
            Ok(response) => {
                last_error = format!("{} answered {}", url, response.status());
            }
            Err(e) => {
                last_error = format!("{} is unreachable: {}", url, e);
            }
        }
        debug!("Probe attempt {} failed: {}", attempt, last_error);
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error)
}
