use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns false once `key` has been hit more than
    /// `limit` times within the current window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// Key for one client in the current one-minute window.
pub fn rate_limit_key(client: &str, now_unix: i64) -> String {
    format!("ratelimit:{}:{}", client, now_unix / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key_changes_per_minute() {
        assert_eq!(rate_limit_key("10.0.0.1", 120), "ratelimit:10.0.0.1:2");
        assert_eq!(rate_limit_key("10.0.0.1", 179), "ratelimit:10.0.0.1:2");
        assert_ne!(rate_limit_key("10.0.0.1", 180), rate_limit_key("10.0.0.1", 179));
    }
}
