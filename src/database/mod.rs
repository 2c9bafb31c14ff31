pub mod models;
pub mod repository;

pub use repository::{PgRepository, Repository};

use sqlx::PgPool;
use tracing::{info, warn};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// 逐条执行 schema.sql。已存在的表/索引不算错误。
pub async fn init_database(pool: &PgPool) -> anyhow::Result<()> {
    info!("Checking database schema...");
    let statements: Vec<&str> = SCHEMA_SQL.split(';').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    for stmt in statements {
        if let Err(e) = sqlx::query(stmt).execute(pool).await {
            if !e.to_string().contains("already exists") {
                warn!("Schema warning: {}", e);
            }
        }
    }
    info!("Database schema check complete.");
    Ok(())
}
