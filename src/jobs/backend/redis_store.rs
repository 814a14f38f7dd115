use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, Pipeline, Script};
use tokio::time::Instant;

use super::{QueueBackend, QueueCounts};
use crate::jobs::connection::RedisEndpoint;
use crate::jobs::envelope::{JobEnvelope, Reservation};
use crate::jobs::error::QueueResult;
use crate::jobs::queue::QueueName;

/// Max delayed jobs promoted per call.
const PROMOTE_BATCH: usize = 100;

/// Interval between non-blocking reservation attempts while a queue is empty.
/// `BLMOVE` would block the shared multiplexed connection, so we poll instead.
const RESERVE_POLL: Duration = Duration::from_millis(100);

const PROMOTE_LUA: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
for _, job in ipairs(due) do
  redis.call('ZREM', KEYS[1], job)
  redis.call('LPUSH', KEYS[2], job)
end
return #due
"#;

// Newest reservation sits at the left of `active`; pushing each one onto the
// right of `wait` leaves the oldest next in line.
const RECOVER_LUA: &str = r#"
local moved = 0
while redis.call('LMOVE', KEYS[1], KEYS[2], 'LEFT', 'RIGHT') do
  moved = moved + 1
end
return moved
"#;

/// Key layout and command construction for one prefix.
#[derive(Debug, Clone)]
struct Keys {
    prefix: String,
}

impl Keys {
    fn key(&self, queue: QueueName, list: &str) -> String {
        format!("{}:{}:{}", self.prefix, queue, list)
    }

    /// Pop the oldest waiting job onto `active`. Jobs enter `wait` on the left.
    fn take(&self, queue: QueueName) -> Cmd {
        let mut cmd = redis::cmd("LMOVE");
        cmd.arg(self.key(queue, "wait")).arg(self.key(queue, "active")).arg("RIGHT").arg("LEFT");
        cmd
    }

    fn push_wait(&self, queue: QueueName, raw: &str) -> Cmd {
        let mut cmd = redis::cmd("LPUSH");
        cmd.arg(self.key(queue, "wait")).arg(raw);
        cmd
    }

    fn release(&self, queue: QueueName, raw: &str) -> Cmd {
        let mut cmd = redis::cmd("LREM");
        cmd.arg(self.key(queue, "active")).arg(1).arg(raw);
        cmd
    }

    /// Atomically drop `raw` from `active` and schedule `updated` at `ready_at_ms`.
    fn delay(&self, queue: QueueName, raw: &str, updated: &str, ready_at_ms: i64) -> Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .add_command(self.release(queue, raw))
            .ignore()
            .cmd("ZADD")
            .arg(self.key(queue, "delayed"))
            .arg(ready_at_ms)
            .arg(updated)
            .ignore();
        pipe
    }

    /// Atomically drop `raw` from `active` and park `updated` with the dead letters.
    fn bury(&self, queue: QueueName, raw: &str, updated: &str) -> Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .add_command(self.release(queue, raw))
            .ignore()
            .cmd("LPUSH")
            .arg(self.key(queue, "dead"))
            .arg(updated)
            .ignore();
        pipe
    }

    fn counts(&self, queue: QueueName) -> Pipeline {
        let mut pipe = redis::pipe();
        pipe.cmd("LLEN")
            .arg(self.key(queue, "wait"))
            .cmd("LLEN")
            .arg(self.key(queue, "active"))
            .cmd("ZCARD")
            .arg(self.key(queue, "delayed"))
            .cmd("LLEN")
            .arg(self.key(queue, "dead"));
        pipe
    }
}

/// Redis-backed queue store.
///
/// Keys per queue: `<prefix>:<queue>:wait` (list, LPUSH in / RPOP out),
/// `:active` (list), `:delayed` (sorted set scored by ready-at epoch millis)
/// and `:dead` (list).
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    keys: Keys,
    promote: Script,
    recover: Script,
}

impl RedisBackend {
    pub async fn connect(endpoint: &RedisEndpoint, prefix: &str) -> QueueResult<Self> {
        let client = redis::Client::open(endpoint.to_url())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(
            host = %endpoint.host,
            port = endpoint.port,
            db = endpoint.db,
            tls = endpoint.tls,
            "Connected to queue store"
        );
        Ok(Self {
            conn,
            keys: Keys { prefix: prefix.to_string() },
            promote: Script::new(PROMOTE_LUA),
            recover: Script::new(RECOVER_LUA),
        })
    }

    async fn try_take(&self, queue: QueueName) -> QueueResult<Option<Reservation>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self.keys.take(queue).query_async(&mut conn).await?;
        let Some(raw) = raw else { return Ok(None) };

        match JobEnvelope::decode(&raw) {
            Ok(envelope) => Ok(Some(Reservation { envelope, raw })),
            Err(e) => {
                // Undecodable entries would be recovered and retaken forever; park them with the dead letters.
                tracing::warn!(queue = %queue, "Moving undecodable job to dead-letter list: {}", e);
                let _: () = self.keys.bury(queue, &raw, &raw).query_async(&mut conn).await?;
                Err(e.into())
            }
        }
    }
}

fn epoch_millis_after(delay: Duration) -> i64 {
    let ready_at = chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
    ready_at.timestamp_millis()
}

#[async_trait]
impl QueueBackend for RedisBackend {
    async fn enqueue(&self, envelope: &JobEnvelope) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = self.keys.push_wait(envelope.queue, &envelope.encode()?).query_async(&mut conn).await?;
        Ok(())
    }

    async fn reserve(&self, queue: QueueName, wait: Duration) -> QueueResult<Option<Reservation>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(reservation) = self.try_take(queue).await? {
                return Ok(Some(reservation));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(RESERVE_POLL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, reservation: &Reservation) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 =
            self.keys.release(reservation.envelope.queue, &reservation.raw).query_async(&mut conn).await?;
        Ok(())
    }

    async fn retry_later(&self, reservation: &Reservation, updated: &JobEnvelope, delay: Duration) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let pipe =
            self.keys.delay(reservation.envelope.queue, &reservation.raw, &updated.encode()?, epoch_millis_after(delay));
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn dead_letter(&self, reservation: &Reservation, updated: &JobEnvelope) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let pipe = self.keys.bury(reservation.envelope.queue, &reservation.raw, &updated.encode()?);
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn promote_due(&self, queue: QueueName) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let mut invocation = self.promote.prepare_invoke();
        invocation
            .key(self.keys.key(queue, "delayed"))
            .key(self.keys.key(queue, "wait"))
            .arg(epoch_millis_after(Duration::ZERO))
            .arg(PROMOTE_BATCH);
        let moved: usize = invocation.invoke_async(&mut conn).await?;
        Ok(moved)
    }

    async fn recover_stalled(&self, queue: QueueName) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let mut invocation = self.recover.prepare_invoke();
        invocation.key(self.keys.key(queue, "active")).key(self.keys.key(queue, "wait"));
        let moved: usize = invocation.invoke_async(&mut conn).await?;
        Ok(moved)
    }

    async fn counts(&self, queue: QueueName) -> QueueResult<QueueCounts> {
        let mut conn = self.conn.clone();
        let (waiting, active, delayed, dead): (usize, usize, usize, usize) =
            self.keys.counts(queue).query_async(&mut conn).await?;
        Ok(QueueCounts { waiting, active, delayed, dead })
    }
}
