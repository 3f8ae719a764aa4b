use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use baas_bridge_migration::{Migrator, MigratorTrait};
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

fn is_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:")
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// 创建 SQLite 连接选项（WAL + 较长的 busy_timeout）
fn create_sqlite_options(url: &str) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("无法解析 SQLite 连接串: {}", url))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(90))
        .pragma("temp_store", "MEMORY");
    if is_in_memory(url) {
        return Ok(options);
    }
    Ok(options
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal))
}

async fn sqlite_connection(url: &str) -> Result<DatabaseConnection> {
    // 内存库每个连接都是独立的库，只能使用单连接
    let max_connections = if is_in_memory(url) { 1 } else { 10 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(90))
        .connect_with(create_sqlite_options(url)?)
        .await?;
    debug!("SQLite 连接池已创建，最大连接数 {}", max_connections);
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn generic_connection(url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);
    let connection = Database::connect(options).await.context("连接数据库失败")?;
    debug!("数据库连接池已创建");
    Ok(connection)
}

pub async fn database_connection(url: &str) -> Result<DatabaseConnection> {
    if is_sqlite(url) {
        sqlite_connection(url).await
    } else {
        generic_connection(url).await
    }
}

/// 确保迁移历史表存在
pub async fn migrate_database(connection: &DatabaseConnection) -> Result<()> {
    Migrator::up(connection, None).await.context("执行启动迁移失败")?;
    debug!("启动迁移已完成");
    Ok(())
}

/// 进行数据库迁移并获取数据库连接，供外部使用
pub async fn setup_database(url: &str) -> Result<DatabaseConnection> {
    if is_sqlite(url) && !is_in_memory(url) {
        // 为迁移创建单连接池，避免多连接导致的锁竞争
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(create_sqlite_options(url)?)
            .await?;
        let connection = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone());
        migrate_database(&connection).await?;
        pool.close().await;
        debug!("迁移完成，已关闭迁移连接池");
        let connection = database_connection(url).await?;
        info!("数据库已就绪");
        return Ok(connection);
    }

    let connection = database_connection(url).await?;
    migrate_database(&connection).await?;
    info!("数据库已就绪");
    Ok(connection)
}

/// 测试用的内存数据库，已执行启动迁移
#[cfg(test)]
pub async fn memory_database() -> DatabaseConnection {
    setup_database("sqlite::memory:").await.unwrap()
}
