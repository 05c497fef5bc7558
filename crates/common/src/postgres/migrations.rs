use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Applies the SQL migrations in a directory by running the goose binary.
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    driver: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: impl Into<String>,
        migrations_dir: impl Into<String>,
        driver: impl Into<String>,
        dsn: impl Into<String>,
    ) -> Self {
        Self {
            goose_binary_path: goose_binary_path.into(),
            migrations_dir: migrations_dir.into(),
            driver: driver.into(),
            dsn: dsn.into(),
        }
    }

    /// Runner for the PostgreSQL backlog schema
    pub fn postgres(config: &crate::postgres::PostgresConfig) -> Self {
        Self::new(
            config.goose_binary_path.clone(),
            config.migrations_dir.clone(),
            "postgres",
            config.dsn(),
        )
    }

    fn args(&self) -> Vec<&str> {
        vec![
            "-dir",
            self.migrations_dir.as_str(),
            self.driver.as_str(),
            self.dsn.as_str(),
            "up",
        ]
    }

    /// Executes `goose -dir {migrations_dir} {driver} {dsn} up`
    pub async fn run_migrations(&self) -> Result<()> {
        debug!(dir = %self.migrations_dir, driver = %self.driver, "running migrations");

        let output = Command::new(&self.goose_binary_path)
            .args(self.args())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.goose_binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!("Migration failed.\nstdout: {}\nstderr: {}", stdout, stderr);
        }

        info!(dir = %self.migrations_dir, "migrations applied");
        Ok(())
    }
}
