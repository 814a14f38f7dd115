#[cfg(test)]
mod tests {
    //! Queue store scenarios against a live Redis. Set `REDIS_TEST_URL` to run them;
    //! each test uses its own key prefix and removes its keys afterwards.

    use std::sync::Arc;
    use std::time::Duration;

    use redis::aio::ConnectionManager;
    use uuid::Uuid;

    use crate::jobs::{
        self, JobEnvelope, JobQueue, OcrJob, QueueBackend, QueueCounts, QueueError, QueueName, RedisBackend,
        RedisEndpoint, WarrantyCheckJob, WorkerEvent, WorkerPool,
    };
    use crate::tests::test_config;

    struct Harness {
        backend: RedisBackend,
        raw: ConnectionManager,
        prefix: String,
    }

    impl Harness {
        async fn connect() -> Option<Self> {
            let Some(url) = std::env::var("REDIS_TEST_URL").ok().filter(|u| !u.is_empty()) else {
                eprintln!("REDIS_TEST_URL not set, skipping");
                return None;
            };
            let endpoint = RedisEndpoint::parse(&url).unwrap();
            let prefix = format!("receipt-tracker-test-{}", Uuid::new_v4());
            let backend = RedisBackend::connect(&endpoint, &prefix).await.unwrap();
            let raw = ConnectionManager::new(redis::Client::open(endpoint.to_url()).unwrap()).await.unwrap();
            Some(Self { backend, raw, prefix })
        }

        fn key(&self, queue: QueueName, list: &str) -> String {
            format!("{}:{}:{}", self.prefix, queue, list)
        }

        async fn cleanup(mut self) {
            let keys: Vec<String> =
                redis::cmd("KEYS").arg(format!("{}:*", self.prefix)).query_async(&mut self.raw).await.unwrap();
            if !keys.is_empty() {
                let _: i64 = redis::cmd("DEL").arg(keys).query_async(&mut self.raw).await.unwrap();
            }
        }
    }

    fn warranty(user: &str) -> JobEnvelope {
        JobEnvelope::new(&WarrantyCheckJob { user_id: user.into() }).unwrap()
    }

    #[tokio::test]
    async fn test_redis_fifo_reserve_and_ack() {
        let Some(mut h) = Harness::connect().await else { return };
        let q = QueueName::WarrantyCheck;
        h.backend.enqueue(&warranty("a")).await.unwrap();
        h.backend.enqueue(&warranty("b")).await.unwrap();

        let waiting: usize = redis::cmd("LLEN").arg(h.key(q, "wait")).query_async(&mut h.raw).await.unwrap();
        assert_eq!(waiting, 2);

        let first = h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.envelope.payload["userId"], "a");
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts { waiting: 1, active: 1, delayed: 0, dead: 0 });

        h.backend.ack(&first).await.unwrap();
        let second = h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(second.envelope.payload["userId"], "b");
        h.backend.ack(&second).await.unwrap();
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts::default());
        assert!(h.backend.reserve(q, Duration::from_millis(50)).await.unwrap().is_none());
        h.cleanup().await;
    }

    #[tokio::test]
    async fn test_redis_retry_waits_out_backoff() {
        let Some(mut h) = Harness::connect().await else { return };
        let q = QueueName::WarrantyCheck;
        h.backend.enqueue(&warranty("retry-me")).await.unwrap();
        let r = h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();
        let updated = r.envelope.failed("boom");

        let before = chrono::Utc::now().timestamp_millis();
        h.backend.retry_later(&r, &updated, Duration::from_millis(300)).await.unwrap();
        let score: f64 = redis::cmd("ZSCORE")
            .arg(h.key(q, "delayed"))
            .arg(updated.encode().unwrap())
            .query_async(&mut h.raw)
            .await
            .unwrap();
        assert!(score as i64 >= before + 300);
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts { waiting: 0, active: 0, delayed: 1, dead: 0 });

        assert_eq!(h.backend.promote_due(q).await.unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.backend.promote_due(q).await.unwrap(), 1);

        let again = h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.envelope.id, r.envelope.id);
        assert_eq!(again.envelope.attempts, 1);
        assert_eq!(again.envelope.last_error.as_deref(), Some("boom"));

        h.backend.dead_letter(&again, &again.envelope.failed("boom again")).await.unwrap();
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts { waiting: 0, active: 0, delayed: 0, dead: 1 });
        h.cleanup().await;
    }

    #[tokio::test]
    async fn test_redis_undecodable_job_is_dead_lettered() {
        let Some(mut h) = Harness::connect().await else { return };
        let q = QueueName::ProductLookup;
        let _: i64 = redis::cmd("LPUSH").arg(h.key(q, "wait")).arg("not json").query_async(&mut h.raw).await.unwrap();

        let err = h.backend.reserve(q, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, QueueError::Codec(_)), "{}", err);
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts { waiting: 0, active: 0, delayed: 0, dead: 1 });
        h.cleanup().await;
    }

    #[tokio::test]
    async fn test_redis_recover_stalled_keeps_order() {
        let Some(h) = Harness::connect().await else { return };
        let q = QueueName::WarrantyCheck;
        for user in ["first", "second", "third"] {
            h.backend.enqueue(&warranty(user)).await.unwrap();
        }
        h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();
        h.backend.reserve(q, Duration::ZERO).await.unwrap().unwrap();

        assert_eq!(h.backend.recover_stalled(q).await.unwrap(), 2);
        assert_eq!(h.backend.counts(q).await.unwrap(), QueueCounts { waiting: 3, active: 0, delayed: 0, dead: 0 });

        let mut order = Vec::new();
        while let Some(r) = h.backend.reserve(q, Duration::ZERO).await.unwrap() {
            order.push(r.envelope.payload["userId"].as_str().unwrap().to_string());
            h.backend.ack(&r).await.unwrap();
        }
        assert_eq!(order, ["first", "second", "third"]);
        h.cleanup().await;
    }

    #[tokio::test]
    async fn test_redis_workers_finish_orphaned_job() {
        let Some(h) = Harness::connect().await else { return };
        let backend: Arc<dyn QueueBackend> = Arc::new(h.backend.clone());
        let job = OcrJob { receipt_id: "r-1".into(), image_url: "/uploads/r-1.jpg".into() };
        let job_id = JobQueue::new(backend.clone()).enqueue(&job).await.unwrap();
        backend.reserve(QueueName::OcrProcessing, Duration::ZERO).await.unwrap().unwrap();

        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        for worker in jobs::standard_workers(&test_config(), backend.clone()) {
            pool.spawn(worker.with_poll_interval(Duration::from_millis(20)));
        }

        let done = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let WorkerEvent::Completed { job_id, .. } = events.recv().await.unwrap() {
                    return job_id;
                }
            }
        })
        .await
        .expect("orphaned job never completed");
        assert_eq!(done, job_id);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(backend.counts(QueueName::OcrProcessing).await.unwrap(), QueueCounts::default());
        h.cleanup().await;
    }
}
