//! Test server harness for integration tests.
//!
//! Spins up the real router on a random localhost port.

use std::net::SocketAddr;

use formkit_server::{router, AppState, FormRegistry};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    forms: FormRegistry,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with the given registry on a random available port.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn start(forms: FormRegistry) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let app = router(AppState::new(forms.clone()));

        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            forms,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Start a server from a JSON schema map.
    pub async fn with_schemas(json: &str) -> Self {
        Self::start(FormRegistry::from_json(json).expect("valid schemas")).await
    }

    /// URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Submission endpoint for a form.
    pub fn form_url(&self, form_id: &str) -> String {
        self.url(&format!("/api/forms/{form_id}"))
    }

    /// The registry the server validates against.
    #[allow(dead_code)]
    pub fn forms(&self) -> &FormRegistry {
        &self.forms
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}
