//! Communication persistence: pending set, dispatch log, inbound queues.
//!
//! The pending set and the per-worker inbound queues are snapshots,
//! replaced wholesale at the end of every tick. The dispatch log is
//! append-only; cooldown and thread state are rebuilt from it at startup.

use std::collections::BTreeMap;

use cadre_types::{
    Channel, CommId, DispatchedMessage, InboundMessage, MessageId, ScheduledCommunication,
    WorkerId,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the communication tables.
pub struct CommStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CommStore<'a> {
    /// Create a new communication store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace the whole pending-communication set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the replace fails.
    pub async fn replace_pending(
        &self,
        pending: &[ScheduledCommunication],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        replace_pending_tx(&mut tx, pending).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Append dispatched messages to the log.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_dispatched(
        &self,
        dispatched: &[DispatchedMessage],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        insert_dispatched_tx(&mut tx, dispatched).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Load the full pending set, ordered by dispatch tick.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure and
    /// [`DbError::Decode`] for an unknown channel string.
    pub async fn load_pending(&self) -> Result<Vec<ScheduledCommunication>, DbError> {
        let rows = sqlx::query_as::<_, PendingRow>(
            r"SELECT id, sender, tick, channel, target, subject, body, cc, bcc, thread_id, reply_to
              FROM scheduled_communications
              ORDER BY tick, id",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(PendingRow::into_comm).collect()
    }

    /// Load dispatches at or after `since_tick`, oldest first.
    ///
    /// Used at startup to rebuild cooldown windows and thread roots.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure and
    /// [`DbError::Decode`] for an unknown channel string.
    pub async fn load_recent_dispatches(
        &self,
        since_tick: u64,
    ) -> Result<Vec<DispatchedMessage>, DbError> {
        let since = i64::try_from(since_tick).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DispatchedRow>(
            r"SELECT id, tick, channel, sender, recipients, subject, body, thread_id, reply_to
              FROM dispatched_messages
              WHERE tick >= $1
              ORDER BY tick, id",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(DispatchedRow::into_message).collect()
    }

    /// Replace all inbound queues with the given snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the replace fails.
    pub async fn replace_queues(
        &self,
        queues: &BTreeMap<WorkerId, Vec<InboundMessage>>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        replace_queues_tx(&mut tx, queues).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Load all inbound queues, grouped per recipient in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure and
    /// [`DbError::Decode`] for an unknown channel string.
    pub async fn load_queues(
        &self,
    ) -> Result<BTreeMap<WorkerId, Vec<InboundMessage>>, DbError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r"SELECT recipient, position, sender, channel, message_id, subject, body, received_tick, needs_reply, replied_tick
              FROM inbound_queue
              ORDER BY recipient, position",
        )
        .fetch_all(self.pool)
        .await?;

        let mut queues: BTreeMap<WorkerId, Vec<InboundMessage>> = BTreeMap::new();
        for row in rows {
            let message = row.into_message()?;
            queues.entry(message.recipient).or_default().push(message);
        }
        Ok(queues)
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped writers, shared with the tick persist path
// ---------------------------------------------------------------------------

/// Replace the pending set inside an existing transaction.
pub(crate) async fn replace_pending_tx(
    tx: &mut Transaction<'_, Postgres>,
    pending: &[ScheduledCommunication],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM scheduled_communications")
        .execute(&mut **tx)
        .await?;

    for comm in pending {
        sqlx::query(
            r"INSERT INTO scheduled_communications
                  (id, sender, tick, channel, target, subject, body, cc, bcc, thread_id, reply_to)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(comm.id.into_inner())
        .bind(comm.sender.into_inner())
        .bind(i64::try_from(comm.tick).unwrap_or(i64::MAX))
        .bind(channel_to_db(comm.channel))
        .bind(&comm.target)
        .bind(comm.subject.as_deref())
        .bind(&comm.body)
        .bind(&comm.cc)
        .bind(&comm.bcc)
        .bind(comm.thread_id.map(MessageId::into_inner))
        .bind(comm.reply_to.map(MessageId::into_inner))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Append dispatches inside an existing transaction.
pub(crate) async fn insert_dispatched_tx(
    tx: &mut Transaction<'_, Postgres>,
    dispatched: &[DispatchedMessage],
) -> Result<(), DbError> {
    for message in dispatched {
        sqlx::query(
            r"INSERT INTO dispatched_messages
                  (id, tick, channel, sender, recipients, subject, body, thread_id, reply_to)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(message.id.into_inner())
        .bind(i64::try_from(message.tick).unwrap_or(i64::MAX))
        .bind(channel_to_db(message.channel))
        .bind(message.sender.into_inner())
        .bind(&message.recipients)
        .bind(message.subject.as_deref())
        .bind(&message.body)
        .bind(message.thread_id.map(MessageId::into_inner))
        .bind(message.reply_to.map(MessageId::into_inner))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Replace all inbound queues inside an existing transaction.
pub(crate) async fn replace_queues_tx(
    tx: &mut Transaction<'_, Postgres>,
    queues: &BTreeMap<WorkerId, Vec<InboundMessage>>,
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM inbound_queue")
        .execute(&mut **tx)
        .await?;

    let total: usize = queues.values().map(Vec::len).sum();
    if total == 0 {
        return Ok(());
    }

    let mut recipients = Vec::with_capacity(total);
    let mut positions = Vec::with_capacity(total);
    let mut senders = Vec::with_capacity(total);
    let mut channels = Vec::with_capacity(total);
    let mut message_ids = Vec::with_capacity(total);
    let mut subjects: Vec<Option<String>> = Vec::with_capacity(total);
    let mut bodies = Vec::with_capacity(total);
    let mut received_ticks = Vec::with_capacity(total);
    let mut need_replies = Vec::with_capacity(total);
    let mut replied_ticks: Vec<Option<i64>> = Vec::with_capacity(total);

    for messages in queues.values() {
        for (position, message) in messages.iter().enumerate() {
            recipients.push(message.recipient.into_inner());
            positions.push(i32::try_from(position).unwrap_or(i32::MAX));
            senders.push(message.sender.into_inner());
            channels.push(channel_to_db(message.channel).to_owned());
            message_ids.push(message.message_id.into_inner());
            subjects.push(message.subject.clone());
            bodies.push(message.body.clone());
            received_ticks.push(i64::try_from(message.received_tick).unwrap_or(i64::MAX));
            need_replies.push(message.needs_reply);
            replied_ticks.push(
                message
                    .replied_tick
                    .map(|tick| i64::try_from(tick).unwrap_or(i64::MAX)),
            );
        }
    }

    sqlx::query(
        r"INSERT INTO inbound_queue
              (recipient, position, sender, channel, message_id, subject, body, received_tick, needs_reply, replied_tick)
          SELECT * FROM UNNEST($1::UUID[], $2::INT[], $3::UUID[], $4::TEXT[], $5::UUID[], $6::TEXT[], $7::TEXT[], $8::BIGINT[], $9::BOOLEAN[], $10::BIGINT[])",
    )
    .bind(&recipients)
    .bind(&positions)
    .bind(&senders)
    .bind(&channels)
    .bind(&message_ids)
    .bind(&subjects)
    .bind(&bodies)
    .bind(&received_ticks)
    .bind(&need_replies)
    .bind(&replied_ticks)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct PendingRow {
    id: Uuid,
    sender: Uuid,
    tick: i64,
    channel: String,
    target: String,
    subject: Option<String>,
    body: String,
    cc: Vec<String>,
    bcc: Vec<String>,
    thread_id: Option<Uuid>,
    reply_to: Option<Uuid>,
}

impl PendingRow {
    fn into_comm(self) -> Result<ScheduledCommunication, DbError> {
        Ok(ScheduledCommunication {
            id: CommId::from(self.id),
            sender: WorkerId::from(self.sender),
            tick: u64::try_from(self.tick).unwrap_or_default(),
            channel: channel_from_db(&self.channel)?,
            target: self.target,
            subject: self.subject,
            body: self.body,
            cc: self.cc,
            bcc: self.bcc,
            thread_id: self.thread_id.map(MessageId::from),
            reply_to: self.reply_to.map(MessageId::from),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DispatchedRow {
    id: Uuid,
    tick: i64,
    channel: String,
    sender: Uuid,
    recipients: Vec<String>,
    subject: Option<String>,
    body: String,
    thread_id: Option<Uuid>,
    reply_to: Option<Uuid>,
}

impl DispatchedRow {
    fn into_message(self) -> Result<DispatchedMessage, DbError> {
        Ok(DispatchedMessage {
            id: MessageId::from(self.id),
            tick: u64::try_from(self.tick).unwrap_or_default(),
            channel: channel_from_db(&self.channel)?,
            sender: WorkerId::from(self.sender),
            recipients: self.recipients,
            subject: self.subject,
            body: self.body,
            thread_id: self.thread_id.map(MessageId::from),
            reply_to: self.reply_to.map(MessageId::from),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct QueueRow {
    recipient: Uuid,
    #[allow(dead_code)]
    position: i32,
    sender: Uuid,
    channel: String,
    message_id: Uuid,
    subject: Option<String>,
    body: String,
    received_tick: i64,
    needs_reply: bool,
    replied_tick: Option<i64>,
}

impl QueueRow {
    fn into_message(self) -> Result<InboundMessage, DbError> {
        Ok(InboundMessage {
            recipient: WorkerId::from(self.recipient),
            sender: WorkerId::from(self.sender),
            channel: channel_from_db(&self.channel)?,
            message_id: MessageId::from(self.message_id),
            subject: self.subject,
            body: self.body,
            received_tick: u64::try_from(self.received_tick).unwrap_or_default(),
            needs_reply: self.needs_reply,
            replied_tick: self
                .replied_tick
                .map(|tick| u64::try_from(tick).unwrap_or_default()),
        })
    }
}

/// Convert a [`Channel`] to its storage string.
pub(crate) const fn channel_to_db(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => "email",
        Channel::Chat => "chat",
    }
}

/// Parse a storage string back into a [`Channel`].
pub(crate) fn channel_from_db(value: &str) -> Result<Channel, DbError> {
    match value {
        "email" => Ok(Channel::Email),
        "chat" => Ok(Channel::Chat),
        other => Err(DbError::Decode(format!("unknown channel: {other}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_storage_strings() {
        for channel in [Channel::Email, Channel::Chat] {
            assert_eq!(channel_from_db(channel_to_db(channel)).unwrap(), channel);
        }
    }

    #[test]
    fn unknown_channel_is_a_decode_error() {
        assert!(matches!(channel_from_db("fax"), Err(DbError::Decode(_))));
    }
}
