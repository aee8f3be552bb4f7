//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL and Redis are reachable and usable
//! through the shared abstractions. They need live services, so they are
//! ignored by default: `cargo test -- --ignored` runs them.

use common::{
    cache::{KeyValueCache, RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires running PostgreSQL and Redis instances"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    // Context entries are written without TTL by the identity service
    let key = "integration_test:authz:ctx";
    redis_pool.set(key, "{}", None).await?;
    assert_eq!(redis_pool.get(key).await?, Some("{}".to_string()));

    redis_pool.delete(key).await?;
    assert_eq!(redis_pool.get(key).await?, None, "Redis delete operation failed");

    Ok(())
}
