//! Shadow databases as throwaway docker containers.
//!
//! Shells out to the `docker` CLI; no daemon API client. The container is
//! started detached with `--rm` so an explicit remove (or a daemon-side
//! exit) always cleans it up.

use async_trait::async_trait;
use pgshift::client::run_cancellable;
use pgshift::{CancellationToken, ShadowHandle, ShadowOrchestrator, ShiftError, ShiftResult};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

const HEALTH_ATTEMPTS: u32 = 60;
const HEALTH_INTERVAL: Duration = Duration::from_millis(500);

pub struct DockerShadow {
    pub image: String,
    pub port: u16,
    pub password: String,
}

impl DockerShadow {
    pub fn new(image: String, port: u16, password: String) -> Self {
        Self {
            image,
            port,
            password,
        }
    }

    async fn docker(&self, args: &[&str]) -> ShiftResult<Output> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| ShiftError::Transient(format!("failed to run docker: {e}")))?;
        if !output.status.success() {
            return Err(ShiftError::Transient(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl ShadowOrchestrator for DockerShadow {
    async fn create(&self, token: &CancellationToken) -> ShiftResult<ShadowHandle> {
        let name = format!(
            "pgshift_shadow_{}_{}",
            std::process::id(),
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        );
        let port_map = format!("{}:5432", self.port);
        let password_env = format!("POSTGRES_PASSWORD={}", self.password);

        tracing::debug!(container = %name, image = %self.image, "starting shadow database");
        run_cancellable(
            token,
            self.docker(&[
                "run",
                "-d",
                "--rm",
                "--name",
                &name,
                "-e",
                &password_env,
                "-p",
                &port_map,
                &self.image,
            ]),
        )
        .await?;

        Ok(ShadowHandle {
            id: name,
            conn_string: format!(
                "postgresql://postgres:{}@127.0.0.1:{}/postgres",
                self.password, self.port
            ),
        })
    }

    async fn wait_healthy(
        &self,
        token: &CancellationToken,
        shadow: &ShadowHandle,
    ) -> ShiftResult<()> {
        for attempt in 0..HEALTH_ATTEMPTS {
            match pgshift::connect(&shadow.conn_string, token).await {
                Ok(client) => {
                    if run_cancellable(token, async {
                        client
                            .batch_execute("SELECT 1")
                            .await
                            .map_err(ShiftError::from_db_error)
                    })
                    .await
                    .is_ok()
                    {
                        tracing::debug!(attempt, "shadow database healthy");
                        return Ok(());
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(_) => {}
            }
            run_cancellable(token, async {
                tokio::time::sleep(HEALTH_INTERVAL).await;
                Ok(())
            })
            .await?;
        }
        Err(ShiftError::Transient(format!(
            "shadow database {} did not become healthy",
            shadow.id
        )))
    }

    async fn remove(&self, shadow: &ShadowHandle) {
        if let Err(e) = self.docker(&["rm", "-f", &shadow.id]).await {
            tracing::debug!("failed to remove shadow container: {e}");
        }
    }
}
