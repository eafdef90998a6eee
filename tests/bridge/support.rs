use cmdr_bridge::config::Config;
use cmdr_bridge::transport::relay::run_relay_with_listener;
use std::sync::Arc;
use std::time::Duration;

pub struct RelayTestServer {
    port: u16,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl RelayTestServer {
    pub async fn start() -> Self {
        Self::start_with(Config::default()).await
    }

    pub async fn start_with(config: Config) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral relay listener should bind");
        let port = listener
            .local_addr()
            .expect("ephemeral relay listener should expose local address")
            .port();

        let config = Arc::new(config);
        let handle = tokio::spawn(async move { run_relay_with_listener(listener, config).await });

        wait_until_relay_ready(port).await;
        Self { port, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }
}

impl Drop for RelayTestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn wait_until_relay_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if health.is_ok_and(|response| response.status().is_success()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    panic!("relay did not become ready on port {port}");
}
