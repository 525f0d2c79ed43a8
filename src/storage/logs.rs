use anyhow::Result;

use super::schema::Database;
use super::types::SystemLog;

impl Database {
    // ========================================================================
    // System Log Operations
    // ========================================================================

    pub async fn insert_log(
        &self,
        level: &str,
        message: &str,
        metadata: Option<&str>,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO system_logs (level, message, metadata, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(level)
        .bind(message)
        .bind(metadata)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent log rows first.
    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<SystemLog>> {
        let logs = sqlx::query_as::<_, SystemLog>(
            "SELECT id, level, message, metadata, created_at FROM system_logs \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    /// Delete rows created before `cutoff` (Unix seconds). Returns rows removed.
    pub async fn delete_logs_before(&self, cutoff: i64) -> Result<u64> {
        let done = sqlx::query("DELETE FROM system_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
