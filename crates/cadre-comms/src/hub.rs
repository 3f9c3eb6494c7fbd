//! The communication hub: scheduling, dedup, cooldown, threading, dispatch.
//!
//! The hub owns the pending-communication set and the per-tick send rules.
//! Plan text goes in through [`CommunicationHub::schedule_from_plan_text`];
//! finalized messages leave through [`CommunicationHub::dispatch`], which
//! resolves targets against a [`Directory`], suppresses duplicates and
//! cooldown violations, resolves reply threading, and forwards survivors
//! to the delivery backend.
//!
//! Suppression is expected behavior, not an error: duplicates and cooldown
//! hits are logged at debug level and reported, unresolvable targets at
//! warn level. Nothing here aborts a tick.

use std::collections::{HashMap, HashSet};

use cadre_types::{
    Channel, CommId, DispatchedMessage, InboundMessage, MessageId, ScheduledCommunication,
    SuppressionReason, Worker, WorkerId,
};
use tracing::{debug, warn};

use crate::delivery::{DeliveryBackend, OutgoingMessage};
use crate::directive::{DirectiveTarget, DirectiveVerb, RejectedLine, parse_plan_text};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable hub parameters.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Minimum ticks between accepted contacts of the same
    /// (channel, sender, recipient address) pair.
    pub cooldown_ticks: u64,
    /// Ticks per simulated day, used to map `HH:MM` onto a tick.
    pub ticks_per_day: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            cooldown_ticks: 30,
            ticks_per_day: 1440,
        }
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// One worker's addressing entry in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryWorker {
    /// The worker.
    pub id: WorkerId,
    /// Display name, the resolution key for directives.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Chat handle.
    pub chat_handle: String,
}

impl DirectoryWorker {
    /// The address used on the given channel.
    pub fn address(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email,
            Channel::Chat => &self.chat_handle,
        }
    }
}

/// A group-chat room entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRoom {
    /// Stable room key, the room's address.
    pub room_key: String,
    /// Current members.
    pub members: Vec<WorkerId>,
}

/// Per-tick snapshot of resolvable targets.
///
/// Built once per dispatch call from the current roster and active rooms.
/// Name lookup is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    by_name: HashMap<String, usize>,
    by_id: HashMap<WorkerId, usize>,
    workers: Vec<DirectoryWorker>,
    rooms: Vec<DirectoryRoom>,
}

impl Directory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker entry.
    pub fn add_worker(&mut self, entry: DirectoryWorker) {
        let idx = self.workers.len();
        self.by_name.insert(entry.name.to_lowercase(), idx);
        self.by_id.insert(entry.id, idx);
        self.workers.push(entry);
    }

    /// Add an active room.
    pub fn add_room(&mut self, room_key: impl Into<String>, members: Vec<WorkerId>) {
        self.rooms.push(DirectoryRoom {
            room_key: room_key.into(),
            members,
        });
    }

    /// Look up a worker by display name, case-insensitively.
    pub fn worker_by_name(&self, name: &str) -> Option<&DirectoryWorker> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .and_then(|&i| self.workers.get(i))
    }

    /// Look up a worker by id.
    pub fn worker_by_id(&self, id: WorkerId) -> Option<&DirectoryWorker> {
        self.by_id.get(&id).and_then(|&i| self.workers.get(i))
    }

    /// All workers in the directory.
    pub fn workers(&self) -> &[DirectoryWorker] {
        &self.workers
    }

    /// Find the room whose key shares a distinguishing token with the
    /// target (e.g. target "alpha team" matches room "project-alpha").
    ///
    /// Generic grouping words never match on their own.
    pub fn room_matching(&self, target: &str) -> Option<&DirectoryRoom> {
        let target_tokens = distinguishing_tokens(target);
        self.rooms.iter().find(|room| {
            distinguishing_tokens(&room.room_key)
                .iter()
                .any(|t| target_tokens.contains(t))
        })
    }
}

/// Lowercased alphanumeric tokens of a target, minus generic group words.
fn distinguishing_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| {
            !t.is_empty() && !matches!(t.as_str(), "team" | "project" | "group" | "room" | "chat")
        })
        .collect()
}

/// Whether a target string names a group destination rather than a person.
fn is_group_keyword(target: &str) -> bool {
    let lower = target.to_lowercase();
    ["team", "project", "group", "everyone"]
        .iter()
        .any(|kw| lower.split(|c: char| !c.is_alphanumeric()).any(|t| t == *kw))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of scheduling one worker's plan text.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    /// Ids of the communications that were queued, in plan order.
    pub scheduled: Vec<CommId>,
    /// Malformed directive lines, for logging and reporting.
    pub rejected: Vec<RejectedLine>,
}

/// One suppressed communication and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suppression {
    /// The pending communication that was dropped.
    pub comm_id: CommId,
    /// The sender, for participation accounting.
    pub sender: WorkerId,
    /// Why it was dropped.
    pub reason: SuppressionReason,
}

/// Everything one dispatch pass produced.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Messages accepted by the delivery backend, in dispatch order.
    pub dispatched: Vec<DispatchedMessage>,
    /// Queue deliveries fanned out to recipient workers.
    pub inbound: Vec<InboundMessage>,
    /// Communications suppressed this pass.
    pub suppressed: Vec<Suppression>,
    /// Replies dispatched, as (original message, reply tick) pairs.
    pub replied: Vec<(MessageId, u64)>,
    /// Sends the delivery backend failed on (logged, not retried).
    pub delivery_failures: u32,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Thread-history entry for reply resolution.
#[derive(Debug, Clone)]
struct ThreadEntry {
    thread_root: MessageId,
    sender: WorkerId,
    channel: Channel,
    subject: Option<String>,
}

/// Dedup key: set membership, cleared every tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    channel: Channel,
    sender: WorkerId,
    recipients: Vec<String>,
    subject: Option<String>,
    body: String,
}

/// The communication hub. See the module docs for the dispatch rules.
#[derive(Debug, Clone)]
pub struct CommunicationHub {
    config: HubConfig,
    pending: Vec<ScheduledCommunication>,
    dedup: HashSet<DedupKey>,
    cooldowns: HashMap<(Channel, WorkerId, String), u64>,
    threads: HashMap<MessageId, ThreadEntry>,
}

impl CommunicationHub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            dedup: HashSet::new(),
            cooldowns: HashMap::new(),
            threads: HashMap::new(),
        }
    }

    /// The pending-communication set, for persistence.
    pub fn pending(&self) -> &[ScheduledCommunication] {
        &self.pending
    }

    /// Clear per-tick dedup state. Called at the start of every tick;
    /// cooldown state persists across ticks.
    pub fn reset_tick_state(&mut self) {
        self.dedup.clear();
    }

    /// Drop all pending communications and accumulated dispatch history.
    /// Used by run resets.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.dedup.clear();
        self.cooldowns.clear();
        self.threads.clear();
    }

    /// Remove a pending communication before dispatch, returning it if it
    /// was still queued. Used by participation gating.
    pub fn unschedule(&mut self, id: CommId) -> Option<ScheduledCommunication> {
        let idx = self.pending.iter().position(|c| c.id == id)?;
        Some(self.pending.remove(idx))
    }

    // -- startup hydration ---------------------------------------------------

    /// Restore the pending set from persisted state.
    pub fn restore_pending(&mut self, pending: Vec<ScheduledCommunication>) {
        self.pending = pending;
    }

    /// Restore one cooldown entry from the persisted dispatch log.
    pub fn restore_cooldown(
        &mut self,
        channel: Channel,
        sender: WorkerId,
        address: String,
        last_tick: u64,
    ) {
        let entry = self.cooldowns.entry((channel, sender, address)).or_insert(0);
        *entry = (*entry).max(last_tick);
    }

    /// Restore one thread-history entry from the persisted dispatch log.
    pub fn restore_thread(
        &mut self,
        message_id: MessageId,
        thread_root: MessageId,
        sender: WorkerId,
        channel: Channel,
        subject: Option<String>,
    ) {
        self.threads.insert(
            message_id,
            ThreadEntry {
                thread_root,
                sender,
                channel,
                subject,
            },
        );
    }

    // -- scheduling ----------------------------------------------------------

    /// Parse a worker's plan text and queue every well-formed directive.
    ///
    /// `HH:MM` maps to the matching tick of the current simulated day; a
    /// time already in the past schedules for the current tick instead.
    /// Malformed lines are rejected and logged, never guessed at.
    pub fn schedule_from_plan_text(
        &mut self,
        sender: &Worker,
        plan_text: &str,
        current_tick: u64,
    ) -> ScheduleOutcome {
        let parsed = parse_plan_text(plan_text);
        let mut outcome = ScheduleOutcome {
            scheduled: Vec::new(),
            rejected: parsed.rejected,
        };

        for rejected in &outcome.rejected {
            warn!(
                sender = %sender.name,
                line = %rejected.line,
                error = %rejected.error,
                "rejected malformed send directive"
            );
        }

        for directive in parsed.accepted {
            let tick = self.directive_tick(directive.hour, directive.minute, current_tick);
            let (channel, target, reply_to) = match directive.target {
                DirectiveTarget::Name(name) => {
                    let channel = match directive.verb {
                        DirectiveVerb::Email => Channel::Email,
                        DirectiveVerb::Chat | DirectiveVerb::Reply => Channel::Chat,
                    };
                    (channel, name, None)
                }
                DirectiveTarget::ReplyTo(id) => {
                    // Reply channel follows the original message when its
                    // thread is known; resolution completes at dispatch.
                    let channel = self
                        .threads
                        .get(&id)
                        .map_or(Channel::Chat, |entry| entry.channel);
                    (channel, id.to_string(), Some(id))
                }
            };

            let comm = ScheduledCommunication {
                id: CommId::new(),
                sender: sender.id,
                tick,
                channel,
                target,
                subject: directive.subject,
                body: directive.body,
                cc: directive.cc,
                bcc: directive.bcc,
                thread_id: None,
                reply_to,
            };
            outcome.scheduled.push(comm.id);
            self.pending.push(comm);
        }

        outcome
    }

    /// Map an `HH:MM` directive time onto a tick of the current day.
    fn directive_tick(&self, hour: u8, minute: u8, current_tick: u64) -> u64 {
        let day_len = self.config.ticks_per_day.max(1);
        let into_day = current_tick.checked_rem(day_len).unwrap_or(0);
        let day_start = current_tick.saturating_sub(into_day);
        let offset = u64::from(hour)
            .saturating_mul(60)
            .saturating_add(u64::from(minute));
        day_start.saturating_add(offset).max(current_tick)
    }

    // -- dispatch ------------------------------------------------------------

    /// Process every communication due at `tick`.
    ///
    /// Resolution, dedup, cooldown, and threading rules are applied in
    /// directive order; survivors are forwarded to the delivery backend.
    /// A delivery failure drops that one message and is counted in the
    /// report; it never aborts the pass.
    pub async fn dispatch(
        &mut self,
        tick: u64,
        directory: &Directory,
        backend: &DeliveryBackend,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        // Due entries leave the pending set exactly once, in plan order.
        let mut due = Vec::new();
        self.pending.retain(|c| {
            if c.tick <= tick {
                due.push(c.clone());
                false
            } else {
                true
            }
        });

        for comm in due {
            self.dispatch_one(comm, tick, directory, backend, &mut report)
                .await;
        }

        report
    }

    /// Apply the send rules to one due communication.
    async fn dispatch_one(
        &mut self,
        comm: ScheduledCommunication,
        tick: u64,
        directory: &Directory,
        backend: &DeliveryBackend,
        report: &mut DispatchReport,
    ) {
        let Some(resolved) = self.resolve(&comm, directory) else {
            warn!(
                comm_id = %comm.id,
                target = %comm.target,
                "dropping directive with unresolvable target"
            );
            report.suppressed.push(Suppression {
                comm_id: comm.id,
                sender: comm.sender,
                reason: SuppressionReason::InvalidRecipient,
            });
            return;
        };

        // Dedup: at most one identical send per tick.
        let key = DedupKey {
            channel: resolved.channel,
            sender: comm.sender,
            recipients: resolved.all_addresses.clone(),
            subject: resolved.subject.clone(),
            body: comm.body.clone(),
        };
        if self.dedup.contains(&key) {
            debug!(comm_id = %comm.id, "suppressing duplicate send");
            report.suppressed.push(Suppression {
                comm_id: comm.id,
                sender: comm.sender,
                reason: SuppressionReason::Duplicate,
            });
            return;
        }

        // Cooldown on the primary contact address.
        let cooldown_key = (
            resolved.channel,
            comm.sender,
            resolved.primary_address.clone(),
        );
        if let Some(&last) = self.cooldowns.get(&cooldown_key)
            && tick.saturating_sub(last) < self.config.cooldown_ticks
        {
            debug!(
                comm_id = %comm.id,
                address = %resolved.primary_address,
                last_contact = last,
                "suppressing send inside cooldown window"
            );
            report.suppressed.push(Suppression {
                comm_id: comm.id,
                sender: comm.sender,
                reason: SuppressionReason::Cooldown,
            });
            return;
        }

        let Some(sender_entry) = directory.worker_by_id(comm.sender) else {
            warn!(comm_id = %comm.id, "sender missing from directory");
            report.suppressed.push(Suppression {
                comm_id: comm.id,
                sender: comm.sender,
                reason: SuppressionReason::InvalidRecipient,
            });
            return;
        };

        let outgoing = OutgoingMessage {
            channel: resolved.channel,
            sender_address: sender_entry.address(resolved.channel).to_string(),
            recipients: resolved.to_addresses.clone(),
            cc: resolved.cc_addresses.clone(),
            bcc: resolved.bcc_addresses.clone(),
            subject: resolved.subject.clone(),
            body: comm.body.clone(),
            thread_id: resolved.thread_root,
            reply_to: comm.reply_to,
        };

        let message_id = match backend.deliver(&outgoing).await {
            Ok(id) => id,
            Err(e) => {
                warn!(comm_id = %comm.id, error = %e, "delivery backend rejected send");
                report.delivery_failures =
                    report.delivery_failures.saturating_add(1);
                return;
            }
        };

        // Accepted: record dedup, refresh cooldowns, register the thread.
        self.dedup.insert(key);
        self.cooldowns.insert(cooldown_key, tick);
        for address in &resolved.all_addresses {
            self.cooldowns
                .insert((resolved.channel, comm.sender, address.clone()), tick);
        }
        let thread_root = resolved.thread_root.unwrap_or(message_id);
        self.threads.insert(
            message_id,
            ThreadEntry {
                thread_root,
                sender: comm.sender,
                channel: resolved.channel,
                subject: resolved.subject.clone(),
            },
        );

        if let Some(original) = comm.reply_to {
            report.replied.push((original, tick));
        }

        report.dispatched.push(DispatchedMessage {
            id: message_id,
            tick,
            channel: resolved.channel,
            sender: comm.sender,
            recipients: resolved.all_addresses,
            subject: resolved.subject.clone(),
            body: comm.body.clone(),
            thread_id: resolved.thread_root,
            reply_to: comm.reply_to,
        });

        let needs_reply = comm.body.contains('?');
        for worker_id in resolved.recipient_workers {
            if worker_id == comm.sender {
                continue;
            }
            report.inbound.push(InboundMessage {
                recipient: worker_id,
                sender: comm.sender,
                channel: resolved.channel,
                message_id,
                subject: resolved.subject.clone(),
                body: comm.body.clone(),
                received_tick: tick,
                needs_reply,
                replied_tick: None,
            });
        }
    }

    /// Resolve a due communication's target against the directory.
    ///
    /// Returns `None` when the target cannot be resolved; no fabricated
    /// addresses ever leave the system.
    fn resolve(
        &self,
        comm: &ScheduledCommunication,
        directory: &Directory,
    ) -> Option<ResolvedSend> {
        if let Some(original) = comm.reply_to {
            return self.resolve_reply(comm, original, directory);
        }

        // A literal worker name wins over group-keyword classification.
        if let Some(entry) = directory.worker_by_name(&comm.target) {
            return Some(self.resolve_direct(comm, entry, directory));
        }

        if is_group_keyword(&comm.target) {
            return self.resolve_group(comm, directory);
        }

        None
    }

    /// Direct message to one named worker, with optional cc/bcc fanout.
    fn resolve_direct(
        &self,
        comm: &ScheduledCommunication,
        entry: &DirectoryWorker,
        directory: &Directory,
    ) -> ResolvedSend {
        let channel = comm.channel;
        let mut recipient_workers = vec![entry.id];
        let primary_address = entry.address(channel).to_string();
        let to_addresses = vec![primary_address.clone()];

        // cc/bcc carry on email only; unresolvable entries are dropped.
        let mut cc_addresses = Vec::new();
        let mut bcc_addresses = Vec::new();
        if channel == Channel::Email {
            for (names, out) in [(&comm.cc, &mut cc_addresses), (&comm.bcc, &mut bcc_addresses)] {
                for name in names {
                    if let Some(copy) = directory.worker_by_name(name) {
                        out.push(copy.email.clone());
                        recipient_workers.push(copy.id);
                    } else {
                        warn!(target = %name, "dropping unresolvable cc/bcc target");
                    }
                }
            }
        }

        let mut all_addresses: Vec<String> = to_addresses
            .iter()
            .chain(cc_addresses.iter())
            .chain(bcc_addresses.iter())
            .cloned()
            .collect();
        all_addresses.sort_unstable();

        ResolvedSend {
            channel,
            primary_address,
            to_addresses,
            cc_addresses,
            bcc_addresses,
            all_addresses,
            recipient_workers,
            subject: comm.subject.clone(),
            thread_root: None,
        }
    }

    /// Group destination: a project room, or the whole active roster.
    fn resolve_group(
        &self,
        comm: &ScheduledCommunication,
        directory: &Directory,
    ) -> Option<ResolvedSend> {
        let lower = comm.target.to_lowercase();
        let everyone = lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|t| t == "everyone");

        let (primary_address, members) = if everyone {
            let members: Vec<WorkerId> = directory.workers().iter().map(|w| w.id).collect();
            (String::from("everyone"), members)
        } else {
            let room = directory.room_matching(&comm.target)?;
            (room.room_key.clone(), room.members.clone())
        };
        if members.is_empty() {
            return None;
        }

        // Group chat addresses the room; group email fans out addresses.
        let (to_addresses, all_addresses) = match comm.channel {
            Channel::Chat => (vec![primary_address.clone()], vec![primary_address.clone()]),
            Channel::Email => {
                let mut addresses: Vec<String> = members
                    .iter()
                    .filter_map(|&id| directory.worker_by_id(id))
                    .filter(|w| w.id != comm.sender)
                    .map(|w| w.email.clone())
                    .collect();
                addresses.sort_unstable();
                (addresses.clone(), addresses)
            }
        };
        if to_addresses.is_empty() {
            return None;
        }

        Some(ResolvedSend {
            channel: comm.channel,
            primary_address,
            to_addresses,
            cc_addresses: Vec::new(),
            bcc_addresses: Vec::new(),
            all_addresses,
            recipient_workers: members,
            subject: comm.subject.clone(),
            thread_root: None,
        })
    }

    /// Reply: recipient, channel, thread, and subject come from the
    /// original message's thread entry.
    fn resolve_reply(
        &self,
        comm: &ScheduledCommunication,
        original: MessageId,
        directory: &Directory,
    ) -> Option<ResolvedSend> {
        let entry = self.threads.get(&original)?;
        let target = directory.worker_by_id(entry.sender)?;
        let channel = entry.channel;
        let primary_address = target.address(channel).to_string();

        let subject = match channel {
            Channel::Email => entry.subject.as_ref().map(|s| {
                if s.starts_with("Re: ") {
                    s.clone()
                } else {
                    format!("Re: {s}")
                }
            }),
            Channel::Chat => None,
        };

        Some(ResolvedSend {
            channel,
            primary_address: primary_address.clone(),
            to_addresses: vec![primary_address.clone()],
            cc_addresses: Vec::new(),
            bcc_addresses: Vec::new(),
            all_addresses: vec![primary_address],
            recipient_workers: vec![entry.sender],
            subject,
            thread_root: Some(entry.thread_root),
        })
    }
}

/// A fully resolved send, ready for the delivery backend.
struct ResolvedSend {
    channel: Channel,
    primary_address: String,
    to_addresses: Vec<String>,
    cc_addresses: Vec<String>,
    bcc_addresses: Vec<String>,
    /// Sorted union of to + cc + bcc, the dedup and audit recipient set.
    all_addresses: Vec<String>,
    recipient_workers: Vec<WorkerId>,
    subject: Option<String>,
    thread_root: Option<MessageId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::delivery::MemoryDelivery;
    use cadre_types::WorkerStatus;

    fn worker(name: &str) -> Worker {
        let handle = format!("@{}", name.to_lowercase().replace(' ', "."));
        Worker {
            id: WorkerId::new(),
            name: name.to_string(),
            role: String::from("Engineer"),
            timezone: String::from("UTC"),
            email: format!("{}@cadre.test", name.to_lowercase().replace(' ', ".")),
            chat_handle: handle,
            is_department_head: false,
            status: WorkerStatus::Working,
            status_until_tick: None,
        }
    }

    fn directory_for(workers: &[&Worker]) -> Directory {
        let mut dir = Directory::new();
        for w in workers {
            dir.add_worker(DirectoryWorker {
                id: w.id,
                name: w.name.clone(),
                email: w.email.clone(),
                chat_handle: w.chat_handle.clone(),
            });
        }
        dir
    }

    fn hub() -> CommunicationHub {
        CommunicationHub::new(HubConfig {
            cooldown_ticks: 30,
            ticks_per_day: 1440,
        })
    }

    #[tokio::test]
    async fn schedules_and_dispatches_a_chat() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let dir = directory_for(&[&dana, &priya]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        let outcome =
            hub.schedule_from_plan_text(&dana, "Chat at 09:00 to Priya Nair: morning!", 0);
        assert_eq!(outcome.scheduled.len(), 1);
        assert_eq!(hub.pending().len(), 1);
        assert_eq!(hub.pending()[0].tick, 540);

        let report = hub.dispatch(540, &dir, &backend).await;
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.inbound.len(), 1);
        assert_eq!(report.inbound[0].recipient, priya.id);
        assert!(hub.pending().is_empty());
    }

    #[tokio::test]
    async fn past_time_schedules_for_current_tick() {
        let dana = worker("Dana Voss");
        let mut hub = hub();
        // 09:00 of day 0 is tick 540; current tick already past it.
        hub.schedule_from_plan_text(&dana, "Chat at 09:00 to Priya Nair: late note", 600);
        assert_eq!(hub.pending()[0].tick, 600);
    }

    #[tokio::test]
    async fn identical_sends_in_one_tick_dispatch_once() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let dir = directory_for(&[&dana, &priya]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        let plan = "Email at 10:00 to Priya Nair: Sync | Free at noon?\n\
                    Email at 10:00 to Priya Nair: Sync | Free at noon?";
        hub.schedule_from_plan_text(&dana, plan, 0);

        hub.reset_tick_state();
        let report = hub.dispatch(600, &dir, &backend).await;
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.suppressed.len(), 1);
        assert_eq!(
            report.suppressed[0].reason,
            SuppressionReason::Duplicate
        );
    }

    #[tokio::test]
    async fn cooldown_suppresses_rapid_recontact() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let dir = directory_for(&[&dana, &priya]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(&dana, "Chat at 09:00 to Priya Nair: one", 0);
        hub.schedule_from_plan_text(&dana, "Chat at 09:10 to Priya Nair: two", 0);
        hub.schedule_from_plan_text(&dana, "Chat at 09:45 to Priya Nair: three", 0);

        hub.reset_tick_state();
        let first = hub.dispatch(540, &dir, &backend).await;
        assert_eq!(first.dispatched.len(), 1);

        // 550 - 540 < 30: inside the window.
        hub.reset_tick_state();
        let second = hub.dispatch(550, &dir, &backend).await;
        assert!(second.dispatched.is_empty());
        assert_eq!(second.suppressed[0].reason, SuppressionReason::Cooldown);

        // 585 - 540 >= 30: window elapsed.
        hub.reset_tick_state();
        let third = hub.dispatch(585, &dir, &backend).await;
        assert_eq!(third.dispatched.len(), 1);
    }

    #[tokio::test]
    async fn unresolvable_target_is_dropped() {
        let dana = worker("Dana Voss");
        let dir = directory_for(&[&dana]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(&dana, "Chat at 09:00 to Nobody Known: hello?", 0);
        hub.reset_tick_state();
        let report = hub.dispatch(540, &dir, &backend).await;
        assert!(report.dispatched.is_empty());
        assert_eq!(
            report.suppressed[0].reason,
            SuppressionReason::InvalidRecipient
        );
    }

    #[tokio::test]
    async fn group_chat_targets_the_room() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let tom = worker("Tom Okafor");
        let mut dir = directory_for(&[&dana, &priya, &tom]);
        dir.add_room("project-alpha", vec![dana.id, priya.id, tom.id]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(&dana, "Chat at 09:00 to alpha team: kickoff in ten", 0);
        hub.reset_tick_state();
        let report = hub.dispatch(540, &dir, &backend).await;

        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.dispatched[0].recipients, vec!["project-alpha"]);
        // Fans out to both other members, never back to the sender.
        assert_eq!(report.inbound.len(), 2);
        assert!(report.inbound.iter().all(|m| m.recipient != dana.id));
    }

    #[tokio::test]
    async fn everyone_reaches_the_whole_roster() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let tom = worker("Tom Okafor");
        let dir = directory_for(&[&dana, &priya, &tom]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(
            &dana,
            "Email at 09:00 to everyone: Heads up | Deploy window moved to Friday.",
            0,
        );
        hub.reset_tick_state();
        let report = hub.dispatch(540, &dir, &backend).await;
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.inbound.len(), 2);
    }

    #[tokio::test]
    async fn reply_threads_back_to_the_original_sender() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let dir = directory_for(&[&dana, &priya]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(
            &dana,
            "Email at 09:00 to Priya Nair: Sync | Do you have time today?",
            0,
        );
        hub.reset_tick_state();
        let first = hub.dispatch(540, &dir, &backend).await;
        let original = first.dispatched[0].id;
        assert!(first.inbound[0].needs_reply);

        let plan = format!("Reply at 09:40 to [{}]: Yes, 14:00 works.", original.0);
        hub.schedule_from_plan_text(&priya, &plan, 540);
        hub.reset_tick_state();
        let second = hub.dispatch(580, &dir, &backend).await;

        assert_eq!(second.dispatched.len(), 1);
        let reply = &second.dispatched[0];
        assert_eq!(reply.channel, Channel::Email);
        assert_eq!(reply.reply_to, Some(original));
        assert_eq!(reply.thread_id, Some(original));
        assert_eq!(reply.subject.as_deref(), Some("Re: Sync"));
        assert_eq!(second.replied, vec![(original, 580)]);
        assert_eq!(second.inbound[0].recipient, dana.id);
    }

    #[tokio::test]
    async fn unschedule_removes_a_pending_send() {
        let dana = worker("Dana Voss");
        let mut hub = hub();
        let outcome = hub.schedule_from_plan_text(&dana, "Chat at 09:00 to Priya Nair: hi", 0);
        let removed = hub.unschedule(outcome.scheduled[0]);
        assert!(removed.is_some());
        assert!(hub.pending().is_empty());
    }

    #[tokio::test]
    async fn cc_targets_receive_copies() {
        let dana = worker("Dana Voss");
        let priya = worker("Priya Nair");
        let tom = worker("Tom Okafor");
        let dir = directory_for(&[&dana, &priya, &tom]);
        let backend = DeliveryBackend::Memory(MemoryDelivery::new());

        let mut hub = hub();
        hub.schedule_from_plan_text(
            &dana,
            "Email at 09:00 to Priya Nair cc Tom Okafor: Plan | Draft attached.",
            0,
        );
        hub.reset_tick_state();
        let report = hub.dispatch(540, &dir, &backend).await;
        assert_eq!(report.inbound.len(), 2);
        let recipients: Vec<WorkerId> = report.inbound.iter().map(|m| m.recipient).collect();
        assert!(recipients.contains(&priya.id));
        assert!(recipients.contains(&tom.id));
    }
}
