use async_trait::async_trait;

use crate::domain::entity::quota_event::QuotaEvent;

/// QuotaEventPublisher は永続化済みのクォータイベントを外部へ配信するためのトレイト。
/// 配信はベストエフォートで、失敗しても判定結果には影響しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaEventPublisher: Send + Sync {
    async fn publish(&self, event: &QuotaEvent) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}

/// NoopQuotaEventPublisher は何もしないデフォルト実装。
pub struct NoopQuotaEventPublisher;

#[async_trait]
impl QuotaEventPublisher for NoopQuotaEventPublisher {
    async fn publish(&self, event: &QuotaEvent) -> anyhow::Result<()> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            user_id = %event.user_id,
            "NoopQuotaEventPublisher: quota event discarded"
        );
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// KafkaQuotaProducer は rdkafka FutureProducer を使った Kafka プロデューサー。
/// メッセージキーは user_id（同一ユーザーのイベント順序をパーティション内で保つ）。
#[cfg(feature = "kafka")]
pub struct KafkaQuotaProducer {
    producer: rdkafka::producer::FutureProducer,
    topic: String,
}

#[cfg(feature = "kafka")]
impl KafkaQuotaProducer {
    pub fn new(brokers: &str, security_protocol: &str, topic: &str) -> anyhow::Result<Self> {
        use rdkafka::config::ClientConfig;

        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", brokers);
        client_config.set("security.protocol", security_protocol);
        client_config.set("acks", "all");
        client_config.set("message.timeout.ms", "5000");

        let producer: rdkafka::producer::FutureProducer = client_config.create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl QuotaEventPublisher for KafkaQuotaProducer {
    async fn publish(&self, event: &QuotaEvent) -> anyhow::Result<()> {
        use rdkafka::producer::FutureRecord;
        use std::time::Duration;

        let payload = serde_json::to_vec(event)?;
        let record = FutureRecord::to(&self.topic)
            .key(&event.user_id)
            .payload(&payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| anyhow::anyhow!("failed to publish quota event: {}", err))?;

        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        use rdkafka::producer::Producer;
        self.producer.flush(std::time::Duration::from_secs(5))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::check_result::WarningLevel;
    use crate::domain::entity::quota_event::QuotaEventMetadata;
    use std::sync::Mutex;

    /// テスト用のインメモリパブリッシャー。
    struct InMemoryPublisher {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl QuotaEventPublisher for InMemoryPublisher {
        async fn publish(&self, event: &QuotaEvent) -> anyhow::Result<()> {
            let payload = serde_json::to_vec(event)?;
            self.messages
                .lock()
                .unwrap()
                .push((event.user_id.clone(), payload));
            Ok(())
        }

        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> QuotaEvent {
        QuotaEvent::new(
            "user-1",
            "basic",
            45.0,
            Some(50.0),
            90.0,
            chrono::Utc::now(),
            QuotaEventMetadata::Warning {
                threshold: WarningLevel::Threshold(90),
            },
        )
    }

    #[tokio::test]
    async fn test_noop_publisher() {
        let publisher = NoopQuotaEventPublisher;
        assert!(publisher.publish(&sample_event()).await.is_ok());
        assert!(publisher.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_publisher_keys_by_user() {
        let publisher = InMemoryPublisher {
            messages: Mutex::new(Vec::new()),
        };
        publisher.publish(&sample_event()).await.unwrap();

        let messages = publisher.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "user-1");
        let json: serde_json::Value = serde_json::from_slice(&messages[0].1).unwrap();
        assert_eq!(json["event_type"], "warning");
        assert_eq!(json["metadata"]["threshold"], "90%");
    }

    #[tokio::test]
    async fn test_mock_publisher() {
        let mut mock = MockQuotaEventPublisher::new();
        mock.expect_publish().times(1).returning(|_| Ok(()));
        assert!(mock.publish(&sample_event()).await.is_ok());
    }
}
