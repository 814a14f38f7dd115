#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{broadcast, Notify};

    use crate::jobs::{
        self, Backoff, Job, JobEnvelope, JobError, JobHandler, JobOutcome, JobQueue, MemoryBackend, OcrJob,
        ProductLookupJob, QueueBackend, QueueName, RetryPolicy, WarrantyCheckJob, Worker, WorkerEvent, WorkerPool,
    };
    use crate::tests::test_config;

    const FAST: Duration = Duration::from_millis(10);

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, backoff: Backoff::Fixed { delay: FAST }, dead_letter: true }
    }

    /// Fails the first `failures` attempts, then succeeds. Records what it saw.
    #[derive(Clone, Default)]
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
        seen: Arc<Mutex<Vec<(u32, OcrJob)>>>,
    }

    #[async_trait]
    impl JobHandler for Flaky {
        type Payload = OcrJob;

        async fn handle(&self, job: Job<OcrJob>) -> Result<JobOutcome, JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((job.attempt, job.payload.clone()));
            if job.attempt <= self.failures {
                return Err(anyhow::anyhow!("scanner offline (attempt {})", job.attempt).into());
            }
            Ok(serde_json::json!({ "success": true, "receiptId": job.payload.receipt_id }))
        }
    }

    struct Panics;

    #[async_trait]
    impl JobHandler for Panics {
        type Payload = WarrantyCheckJob;

        async fn handle(&self, _job: Job<WarrantyCheckJob>) -> Result<JobOutcome, JobError> {
            panic!("warranty table missing")
        }
    }

    /// Sleeps for `hold`, tracking the peak number of concurrent runs.
    #[derive(Clone)]
    struct Slow {
        hold: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        started: Arc<Notify>,
    }

    impl Slow {
        fn new(hold: Duration) -> Self {
            Self {
                hold,
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                started: Arc::new(Notify::new()),
            }
        }
    }

    #[async_trait]
    impl JobHandler for Slow {
        type Payload = ProductLookupJob;

        async fn handle(&self, job: Job<ProductLookupJob>) -> Result<JobOutcome, JobError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.notify_one();
            tokio::time::sleep(self.hold).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "success": true, "upcCode": job.payload.upc_code }))
        }
    }

    /// Returns its payload as the outcome.
    struct Echo<P>(std::marker::PhantomData<P>);

    #[async_trait]
    impl<P: jobs::JobPayload> JobHandler for Echo<P> {
        type Payload = P;

        async fn handle(&self, job: Job<P>) -> Result<JobOutcome, JobError> {
            Ok(serde_json::to_value(&job.payload).map_err(anyhow::Error::from)?)
        }
    }

    fn echo<P: jobs::JobPayload>(backend: Arc<MemoryBackend>) -> Worker {
        Worker::new(Echo::<P>(std::marker::PhantomData), backend).with_poll_interval(FAST)
    }

    fn ocr_job(id: &str) -> OcrJob {
        OcrJob { receipt_id: id.to_string(), image_url: format!("/uploads/{}.jpg", id) }
    }

    fn lookup_job(n: usize) -> ProductLookupJob {
        ProductLookupJob { receipt_id: format!("r-{}", n), upc_code: format!("0123456789{:02}", n) }
    }

    /// Next event that is not `Ready`, failing the test after five seconds.
    async fn next_event(rx: &mut broadcast::Receiver<WorkerEvent>) -> WorkerEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for a worker event")
                .unwrap();
            if !matches!(event, WorkerEvent::Ready { .. }) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_handler_receives_payload_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = JobQueue::new(backend.clone());
        let handler = Flaky::default();
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_poll_interval(FAST));

        let job_id = queue.enqueue(&ocr_job("r-100")).await.unwrap();

        match next_event(&mut events).await {
            WorkerEvent::Completed { queue, job_id: done, outcome } => {
                assert_eq!(queue, QueueName::OcrProcessing);
                assert_eq!(done, job_id);
                assert_eq!(outcome, serde_json::json!({ "success": true, "receiptId": "r-100" }));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(*handler.seen.lock().unwrap(), vec![(1, ocr_job("r-100"))]);

        pool.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(backend.counts(QueueName::OcrProcessing).await.unwrap(), jobs::QueueCounts::default());
    }

    #[tokio::test]
    async fn test_every_queue_passes_payloads_through() {
        let backend = Arc::new(MemoryBackend::new());
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(echo::<OcrJob>(backend.clone()));
        pool.spawn(echo::<WarrantyCheckJob>(backend.clone()));
        pool.spawn(echo::<jobs::NotificationJob>(backend.clone()));
        pool.spawn(echo::<ProductLookupJob>(backend.clone()));

        let queue = JobQueue::new(backend.clone());
        queue.enqueue(&ocr_job("r-5")).await.unwrap();
        queue.enqueue(&WarrantyCheckJob { user_id: "u-5".into() }).await.unwrap();
        queue.enqueue(&jobs::NotificationJob { notification_id: "n-5".into() }).await.unwrap();
        queue.enqueue(&lookup_job(5)).await.unwrap();

        let mut seen = std::collections::HashMap::new();
        for _ in 0..4 {
            match next_event(&mut events).await {
                WorkerEvent::Completed { queue, outcome, .. } => {
                    seen.insert(queue, outcome);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(seen[&QueueName::OcrProcessing], serde_json::to_value(ocr_job("r-5")).unwrap());
        assert_eq!(seen[&QueueName::WarrantyCheck], serde_json::json!({ "userId": "u-5" }));
        assert_eq!(seen[&QueueName::SendNotification], serde_json::json!({ "notificationId": "n-5" }));
        assert_eq!(seen[&QueueName::ProductLookup], serde_json::to_value(lookup_job(5)).unwrap());
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_job_is_retried_with_backoff() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Flaky { failures: 1, ..Flaky::default() };
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_retry(fast_retry(3)).with_poll_interval(FAST));

        JobQueue::new(backend.clone()).enqueue(&ocr_job("r-7")).await.unwrap();

        match next_event(&mut events).await {
            WorkerEvent::Failed { attempts, error, retry_in_ms, dead_lettered, .. } => {
                assert_eq!(attempts, 1);
                assert!(error.contains("scanner offline"), "{}", error);
                assert_eq!(retry_in_ms, Some(10));
                assert!(!dead_lettered);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(next_event(&mut events).await, WorkerEvent::Completed { .. }));

        let attempts: Vec<u32> = handler.seen.lock().unwrap().iter().map(|(a, _)| *a).collect();
        assert_eq!(attempts, vec![1, 2]);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_job_is_dead_lettered() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Flaky { failures: u32::MAX, ..Flaky::default() };
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_retry(fast_retry(2)).with_poll_interval(FAST));

        let job_id = JobQueue::new(backend.clone()).enqueue(&ocr_job("r-9")).await.unwrap();

        let mut last = None;
        for _ in 0..2 {
            last = Some(next_event(&mut events).await);
        }
        match last.unwrap() {
            WorkerEvent::Failed { attempts, dead_lettered, retry_in_ms, .. } => {
                assert_eq!(attempts, 2);
                assert!(dead_lettered);
                assert_eq!(retry_in_ms, None);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let dead = backend.dead_letters(QueueName::OcrProcessing);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, job_id);
        assert_eq!(dead[0].attempts, 2);
        assert!(dead[0].last_error.as_deref().unwrap().contains("attempt 2"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        let counts = backend.counts(QueueName::OcrProcessing).await.unwrap();
        assert_eq!((counts.waiting, counts.active, counts.delayed, counts.dead), (0, 0, 0, 1));
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_retried() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Flaky::default();
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_retry(fast_retry(5)).with_poll_interval(FAST));

        let mut envelope = JobEnvelope::new(&ocr_job("r-1")).unwrap();
        envelope.payload = serde_json::json!({ "receipt": 1 });
        backend.enqueue(&envelope).await.unwrap();

        match next_event(&mut events).await {
            WorkerEvent::Failed { attempts, error, dead_lettered, .. } => {
                assert_eq!(attempts, 1);
                assert!(error.starts_with("invalid job payload"), "{}", error);
                assert!(dead_lettered);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_failure() {
        let backend = Arc::new(MemoryBackend::new());
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(Panics, backend.clone()).with_retry(fast_retry(1)).with_poll_interval(FAST));

        let queue = JobQueue::new(backend.clone());
        queue.enqueue(&WarrantyCheckJob { user_id: "u-1".into() }).await.unwrap();

        match next_event(&mut events).await {
            WorkerEvent::Failed { queue, error, dead_lettered, .. } => {
                assert_eq!(queue, QueueName::WarrantyCheck);
                assert!(error.contains("warranty table missing"), "{}", error);
                assert!(dead_lettered);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // The worker survives and keeps consuming
        queue.enqueue(&WarrantyCheckJob { user_id: "u-2".into() }).await.unwrap();
        assert!(matches!(next_event(&mut events).await, WorkerEvent::Failed { .. }));
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Slow::new(Duration::from_millis(100));
        let worker = Worker::new(handler.clone(), backend.clone()).with_poll_interval(FAST);
        assert_eq!(worker.concurrency(), 3);

        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        let queue = JobQueue::new(backend.clone());
        for n in 0..9 {
            queue.enqueue(&lookup_job(n)).await.unwrap();
        }
        pool.spawn(worker);

        for _ in 0..9 {
            assert!(matches!(next_event(&mut events).await, WorkerEvent::Completed { .. }));
        }
        let peak = handler.peak.load(Ordering::SeqCst);
        assert!(peak <= 3 && peak >= 2, "peak concurrency {}", peak);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_jobs() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Slow::new(Duration::from_millis(150));
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_poll_interval(FAST));

        JobQueue::new(backend.clone()).enqueue(&lookup_job(1)).await.unwrap();
        handler.started.notified().await;

        pool.shutdown(Duration::from_secs(2)).await.unwrap();
        assert!(matches!(next_event(&mut events).await, WorkerEvent::Completed { .. }));
        assert_eq!(backend.counts(QueueName::ProductLookup).await.unwrap().active, 0);
    }

    #[tokio::test]
    async fn test_shutdown_reports_drain_timeout() {
        let backend = Arc::new(MemoryBackend::new());
        let handler = Slow::new(Duration::from_secs(10));
        let pool = WorkerPool::new();
        pool.spawn(Worker::new(handler.clone(), backend.clone()).with_poll_interval(FAST));

        JobQueue::new(backend.clone()).enqueue(&lookup_job(1)).await.unwrap();
        handler.started.notified().await;

        let err = pool.shutdown(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.timeout, Duration::from_millis(50));
        assert!(err.in_flight >= 1);
    }

    #[tokio::test]
    async fn test_job_queue_counts() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = JobQueue::new(backend);

        let a = queue.enqueue(&ocr_job("r-1")).await.unwrap();
        let b = queue.enqueue(&ocr_job("r-2")).await.unwrap();
        assert_ne!(a, b);
        queue.enqueue(&WarrantyCheckJob { user_id: "u-1".into() }).await.unwrap();

        assert_eq!(queue.counts(QueueName::OcrProcessing).await.unwrap().waiting, 2);
        assert_eq!(queue.counts(QueueName::WarrantyCheck).await.unwrap().waiting, 1);
        assert_eq!(queue.counts(QueueName::SendNotification).await.unwrap().waiting, 0);
    }

    #[tokio::test]
    async fn test_standard_workers_cover_every_queue() {
        let cfg = test_config();
        let workers = jobs::standard_workers(&cfg, Arc::new(MemoryBackend::new()));

        let layout: Vec<(QueueName, usize)> = workers.iter().map(|w| (w.queue(), w.concurrency())).collect();
        assert_eq!(
            layout,
            vec![
                (QueueName::OcrProcessing, 2),
                (QueueName::WarrantyCheck, 1),
                (QueueName::SendNotification, 5),
                (QueueName::ProductLookup, 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_job_orphaned_by_crashed_worker_runs_again() {
        let cfg = test_config();
        let backend = Arc::new(MemoryBackend::new());
        let job_id = JobQueue::new(backend.clone()).enqueue(&ocr_job("r-9")).await.unwrap();

        // Reserved and never settled, as if the process died mid-job.
        let orphan = backend.reserve(QueueName::OcrProcessing, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(orphan.envelope.id, job_id);
        assert_eq!(backend.counts(QueueName::OcrProcessing).await.unwrap().active, 1);

        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        for worker in jobs::standard_workers(&cfg, backend.clone()) {
            pool.spawn(worker.with_poll_interval(FAST));
        }

        match next_event(&mut events).await {
            WorkerEvent::Completed { queue, job_id: done, outcome } => {
                assert_eq!(queue, QueueName::OcrProcessing);
                assert_eq!(done, job_id);
                assert_eq!(outcome, serde_json::json!({ "success": true, "receiptId": "r-9" }));
            }
            other => panic!("unexpected event {:?}", other),
        }
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        let counts = backend.counts(QueueName::OcrProcessing).await.unwrap();
        assert_eq!((counts.waiting, counts.active, counts.delayed, counts.dead), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_standard_handlers_complete_jobs() {
        let cfg = test_config();
        let backend = Arc::new(MemoryBackend::new());
        let pool = WorkerPool::new();
        let mut events = pool.subscribe();
        for worker in jobs::standard_workers(&cfg, backend.clone()) {
            pool.spawn(worker.with_poll_interval(FAST));
        }

        let queue = JobQueue::new(backend.clone());
        queue.enqueue(&ocr_job("r-42")).await.unwrap();
        queue.enqueue(&jobs::NotificationJob { notification_id: "n-1".into() }).await.unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            match next_event(&mut events).await {
                WorkerEvent::Completed { outcome, .. } => outcomes.push(outcome),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(outcomes.contains(&serde_json::json!({ "success": true, "receiptId": "r-42" })));
        assert!(outcomes.contains(&serde_json::json!({ "success": true, "notificationId": "n-1" })));
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }
}
