use async_trait::async_trait;
use libra_error::{LibraError, Result};
use redis::AsyncCommands;

/// 事件发布接口，把 payload 投递到命名队列
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, queue: &str, payload: &str) -> Result<()>;
}

/// Redis 列表队列发布器；生产端 LPUSH，worker 端 BRPOP 消费
pub struct RedisEventPublisher {
    client: redis::Client,
}

impl RedisEventPublisher {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| LibraError::Queue {
            message: format!("无法创建 Redis 客户端: {}", e),
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, queue: &str, payload: &str) -> Result<()> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| LibraError::Queue {
                message: format!("无法连接 Redis: {}", e),
            })?;

        let _: i64 = conn
            .lpush(queue, payload)
            .await
            .map_err(|e| LibraError::Queue {
                message: format!("LPUSH {} 失败: {}", queue, e),
            })?;

        Ok(())
    }
}
