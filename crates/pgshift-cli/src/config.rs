use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A loaded `pgshift.toml` plus the directory it came from, so relative
/// paths resolve against the project root rather than the CWD.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    #[allow(dead_code)]
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let file = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path).map_err(|e| {
                anyhow::anyhow!("failed to read config file {}: {e}", config_path.display())
            })?;
            toml::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("failed to parse config file {}: {e}", config_path.display())
            })?
        } else {
            // everything has a default or an env override
            ConfigFile::default()
        };

        Ok(Self {
            config_path,
            config_dir,
            file,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.resolve_path(&self.file.migrations.dir)
    }

    /// Target connection string: flag, then environment, then config.
    pub fn resolve_database_url(&self, flag: Option<String>) -> anyhow::Result<String> {
        if let Some(url) = flag {
            return Ok(url);
        }
        if let Ok(url) = std::env::var("PGSHIFT_DB_URL") {
            return Ok(url);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return Ok(url);
        }
        self.file
            .database
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no database url: pass --database, set DATABASE_URL, or configure [database] url"))
    }

    /// Connection string of the live local development database, when one
    /// is configured (enables the drift check on push).
    pub fn local_database_url(&self) -> Option<String> {
        std::env::var("PGSHIFT_LOCAL_DB_URL")
            .ok()
            .or_else(|| self.file.database.local_url.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub migrations: MigrationsConfig,

    #[serde(default)]
    pub shadow: ShadowConfig,

    #[serde(default)]
    pub diff: DiffConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Target database (push/list/up/repair).
    pub url: Option<String>,
    /// Live local development database (drift check source of truth).
    pub local_url: Option<String>,
    /// Schemas forwarded to the diff tool; empty means all.
    #[serde(default)]
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: String,
    /// Forwarded to the seed collaborator; unused by the engine itself.
    pub seed: Option<String>,
    /// Forwarded to the globals collaborator; unused by the engine itself.
    pub roles: Option<String>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            seed: None,
            roles: None,
        }
    }
}

fn default_migrations_dir() -> String {
    "supabase/migrations".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowConfig {
    #[serde(default = "default_shadow_image")]
    pub image: String,
    #[serde(default = "default_shadow_port")]
    pub port: u16,
    #[serde(default = "default_shadow_password")]
    pub password: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            image: default_shadow_image(),
            port: default_shadow_port(),
            password: default_shadow_password(),
        }
    }
}

fn default_shadow_image() -> String {
    "postgres:17-alpine".to_string()
}

fn default_shadow_port() -> u16 {
    54320
}

fn default_shadow_password() -> String {
    "postgres".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    /// Schema-diff command template; `{source}`, `{target}`, and
    /// `{schemas}` are substituted.
    #[serde(default = "default_diff_command")]
    pub command: Vec<String>,
    /// Schema-dump command template; `{conn}` is substituted.
    #[serde(default = "default_dump_command")]
    pub dump_command: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            command: default_diff_command(),
            dump_command: default_dump_command(),
        }
    }
}

fn default_diff_command() -> Vec<String> {
    ["migra", "--unsafe", "{source}", "{target}"]
        .map(String::from)
        .to_vec()
}

fn default_dump_command() -> Vec<String> {
    [
        "pg_dump",
        "--schema-only",
        "--no-owner",
        "--no-privileges",
        "--dbname",
        "{conn}",
    ]
    .map(String::from)
    .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
[database]
url = "postgres://postgres@db.example.com:5432/postgres"
local_url = "postgres://postgres@127.0.0.1:54322/postgres"
schemas = ["public", "auth"]

[migrations]
dir = "db/migrations"

[shadow]
image = "postgres:16-alpine"
port = 54399

[diff]
command = ["pg-schema-diff", "{source}", "{target}"]
"#;
        let file: ConfigFile = toml::from_str(raw).expect("parse");
        assert_eq!(file.migrations.dir, "db/migrations");
        assert_eq!(file.shadow.port, 54399);
        assert_eq!(file.database.schemas, vec!["public", "auth"]);
        assert_eq!(file.diff.command[0], "pg-schema-diff");
        // untouched sections keep their defaults
        assert_eq!(file.shadow.password, "postgres");
        assert_eq!(file.diff.dump_command[0], "pg_dump");
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let file: ConfigFile = toml::from_str("").expect("parse");
        assert_eq!(file.migrations.dir, "supabase/migrations");
        assert!(file.database.url.is_none());
        assert_eq!(file.shadow.image, "postgres:17-alpine");
    }
}
