//! Matchmaking queue coordinator
//!
//! [`QueueCoordinator`] owns every mutation of the waiting pool. A call to
//! [`QueueCoordinator::enroll`] runs sequentially:
//!
//! 1. drop any earlier entry for the caller,
//! 2. insert the caller (pool member plus expiring metadata record),
//! 3. look at the two earliest members and, if the caller is one of them and
//!    both records are live, remove both and announce a match.
//!
//! Every pool mutation is followed by a best-effort `queueUpdate`. The
//! coordinator holds no in-process state about the pool, so any number of
//! instances may share one store. Of several racing pairings, only the call
//! that removes both members forms the match.

use crate::bot::PairingFallbackPolicy;
use crate::error::{MatchmakingError, Result};
use crate::events::EventPublisher;
use crate::metrics::MetricsCollector;
use crate::queue::clock::{Clock, SystemClock};
use crate::queue::records::{decode_player, encode_player, PlayerRecord, QueueKeys};
use crate::store::{QueueStore, StoreBatch};
use crate::types::{
    JoinRequest, MatchFound, MatchResult, QueuePlayer, QueueSnapshot, QueueUpdate,
    MATCH_FOUND_EVENT, QUEUE_UPDATE_EVENT,
};
use crate::utils::{current_timestamp, generate_room_id};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default age after which a pool entry is ignored
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(300);

/// Pool keys and entry lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub keys: QueueKeys,
    pub entry_ttl: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            keys: QueueKeys::default(),
            entry_ttl: DEFAULT_ENTRY_TTL,
        }
    }
}

/// Counters kept by one coordinator instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Accepted enrollments
    pub enrollments: u64,
    /// Real matches formed by this instance
    pub matches_formed: u64,
    /// Mock matches handed out
    pub mock_matches: u64,
    /// Stale or corrupt entries removed
    pub stale_removed: u64,
}

/// Outcome of inspecting the two earliest pool members
enum Pairing {
    Paired(QueuePlayer),
    NotEligible,
    Healed,
}

/// The matchmaking queue coordinator
#[derive(Clone)]
pub struct QueueCoordinator {
    /// Shared pool storage
    store: Arc<dyn QueueStore>,
    /// Notifier for pool size and match announcements
    event_publisher: Arc<dyn EventPublisher>,
    /// Time source for enrollment timestamps
    clock: Arc<dyn Clock>,
    /// What to do with a lone caller
    fallback: PairingFallbackPolicy,
    settings: QueueSettings,
    stats: Arc<RwLock<CoordinatorStats>>,
    metrics_collector: Arc<MetricsCollector>,
}

impl QueueCoordinator {
    /// Create a coordinator with default settings and no fallback
    pub fn new(store: Arc<dyn QueueStore>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(store, event_publisher, metrics_collector)
    }

    /// Create a coordinator reporting into `metrics_collector`
    pub fn with_metrics(
        store: Arc<dyn QueueStore>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            event_publisher,
            clock: Arc::new(SystemClock),
            fallback: PairingFallbackPolicy::None,
            settings: QueueSettings::default(),
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
            metrics_collector,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fallback(mut self, fallback: PairingFallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn fallback(&self) -> &PairingFallbackPolicy {
        &self.fallback
    }

    pub fn store(&self) -> Arc<dyn QueueStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Snapshot of this instance's counters
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Enroll a player and try to pair them.
    ///
    /// Returns `Waiting` when no opponent is available yet. A matched result
    /// lists the opponent first and the caller second, identical to the
    /// `matchFound` announcement.
    pub async fn enroll(&self, request: JoinRequest) -> Result<MatchResult> {
        let timer = self.metrics_collector.start_timer();
        let outcome = self.enroll_inner(request).await;

        match &outcome {
            Ok(result) => self
                .metrics_collector
                .record_enrollment(result, timer.stop()),
            Err(e) => self
                .metrics_collector
                .record_enrollment_failure(MatchmakingError::is_invalid_input(e), timer.stop()),
        }

        outcome
    }

    async fn enroll_inner(&self, request: JoinRequest) -> Result<MatchResult> {
        if request.player_id.trim().is_empty() {
            return Err(MatchmakingError::InvalidInput {
                reason: "playerId is required".to_string(),
            }
            .into());
        }

        info!(
            "Processing join request - player_id: '{}'",
            request.player_id
        );

        self.remove_players(&[request.player_id.as_str()]).await?;

        let player = QueuePlayer {
            id: request.player_id,
            username: request.username,
            joined_at: self.clock.now_ms(),
        };
        self.store_player(&player).await?;
        self.update_stats(|stats| stats.enrollments += 1);

        match self.try_match(&player).await? {
            Pairing::Paired(opponent) => Ok(self.form_match(opponent, player).await),
            Pairing::NotEligible | Pairing::Healed => self.fall_back(player).await,
        }
    }

    /// Current pool size
    pub async fn pool_size(&self) -> Result<u64> {
        let total = self
            .store
            .ordered_count(&self.settings.keys.queue_key)
            .await?;
        self.metrics_collector.set_pool_size(total);
        Ok(total)
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        Ok(QueueSnapshot {
            total: self.pool_size().await?,
            taken_at: current_timestamp(),
        })
    }

    /// Remove players (pool member and metadata) in one batch, then announce
    async fn remove_players(&self, player_ids: &[&str]) -> Result<()> {
        let mut unique: Vec<String> = Vec::with_capacity(player_ids.len());
        for id in player_ids {
            if !id.is_empty() && !unique.iter().any(|seen| seen == id) {
                unique.push((*id).to_string());
            }
        }
        if unique.is_empty() {
            return Ok(());
        }

        let keys = &self.settings.keys;
        let mut batch = StoreBatch::new().ordered_remove(&keys.queue_key, unique.clone());
        for id in &unique {
            batch = batch.delete(&keys.player_key(id));
        }

        let started = Instant::now();
        self.store.execute(batch).await?;
        self.metrics_collector
            .record_store_operation("remove_players", started.elapsed());
        debug!("Removed players from pool: {:?}", unique);

        self.announce_pool_size().await;
        Ok(())
    }

    async fn store_player(&self, player: &QueuePlayer) -> Result<()> {
        let record = encode_player(player).map_err(|e| MatchmakingError::InternalError {
            message: format!("Failed to serialize player record: {}", e),
        })?;

        let keys = &self.settings.keys;
        let batch = StoreBatch::new()
            .ordered_insert(&keys.queue_key, player.joined_at, &player.id)
            .put_with_expiry(
                &keys.player_key(&player.id),
                record,
                self.settings.entry_ttl,
            );

        let started = Instant::now();
        self.store.execute(batch).await?;
        self.metrics_collector
            .record_store_operation("store_player", started.elapsed());
        debug!(
            "Player {} entered pool at {}",
            player.id, player.joined_at
        );

        self.announce_pool_size().await;
        Ok(())
    }

    async fn try_match(&self, player: &QueuePlayer) -> Result<Pairing> {
        let keys = &self.settings.keys;
        let leaders = self
            .store
            .ordered_range_by_rank(&keys.queue_key, 0, 1)
            .await?;

        if leaders.len() < 2 || !leaders.iter().any(|id| id == &player.id) {
            debug!(
                "Player {} not among the two earliest entries ({} checked)",
                player.id,
                leaders.len()
            );
            return Ok(Pairing::NotEligible);
        }

        let opponent_id = if leaders[0] == player.id {
            leaders[1].clone()
        } else {
            leaders[0].clone()
        };

        let raw = self
            .store
            .batch_get(&[keys.player_key(&player.id), keys.player_key(&opponent_id)])
            .await?;
        let mut raw = raw.into_iter();
        let (own_raw, opponent_raw) = (raw.next().flatten(), raw.next().flatten());

        let now = self.clock.now_ms();
        let ttl = self.settings.entry_ttl;
        let own = decode_player(own_raw.as_deref(), &player.id, now, ttl);
        let opponent = decode_player(opponent_raw.as_deref(), &opponent_id, now, ttl);

        let mut unusable: Vec<&str> = Vec::new();
        if !opponent.is_live() {
            self.report_unusable(&opponent_id, &opponent);
            unusable.push(&opponent_id);
        }
        if !own.is_live() {
            self.report_unusable(&player.id, &own);
            unusable.push(&player.id);
        }

        if !unusable.is_empty() {
            self.remove_players(&unusable).await?;
            self.metrics_collector.record_stale_removed(unusable.len());
            self.update_stats(|stats| stats.stale_removed += unusable.len() as u64);
            return Ok(Pairing::Healed);
        }

        let (Some(opponent), Some(own)) = (opponent.live(), own.live()) else {
            return Ok(Pairing::NotEligible);
        };

        // Claim in pool order so racing callers contend on the same member first
        let claimed = if leaders[0] == player.id {
            self.claim_pair(&own, &opponent).await?
        } else {
            self.claim_pair(&opponent, &own).await?
        };
        if !claimed {
            return Ok(Pairing::NotEligible);
        }

        Ok(Pairing::Paired(opponent))
    }

    /// Take both players out of the pool, earliest first.
    ///
    /// Members are removed one at a time; the call owns the pair only if it
    /// removed both. When a concurrent enrollment got to either member first,
    /// whatever this call removed is put back at its original score.
    async fn claim_pair(&self, first: &QueuePlayer, second: &QueuePlayer) -> Result<bool> {
        let keys = &self.settings.keys;
        let started = Instant::now();

        let mut claimed: Vec<&QueuePlayer> = Vec::with_capacity(2);
        for member in [first, second] {
            let removed = self
                .store
                .ordered_remove(&keys.queue_key, &[member.id.clone()])
                .await?;
            if removed == 0 {
                break;
            }
            claimed.push(member);
        }
        self.metrics_collector
            .record_store_operation("claim_pair", started.elapsed());

        if claimed.len() < 2 {
            info!(
                "Pairing of '{}' and '{}' already claimed ({} of 2 removed)",
                first.id,
                second.id,
                claimed.len()
            );
            for member in claimed {
                self.store
                    .ordered_insert(&keys.queue_key, member.joined_at, &member.id)
                    .await?;
                debug!("Restored {} to the pool at {}", member.id, member.joined_at);
            }
            return Ok(false);
        }

        let batch = StoreBatch::new()
            .delete(&keys.player_key(&first.id))
            .delete(&keys.player_key(&second.id));
        self.store.execute(batch).await?;

        self.announce_pool_size().await;
        Ok(true)
    }

    async fn form_match(&self, opponent: QueuePlayer, player: QueuePlayer) -> MatchResult {
        let room_id = generate_room_id();
        let players = [opponent, player];

        info!(
            "Match formed - room_id: '{}', players: '{}' vs '{}'",
            room_id, players[0].id, players[1].id
        );

        let started = Instant::now();
        let published = self
            .event_publisher
            .publish_match_found(MatchFound {
                room_id: room_id.clone(),
                players: players.clone(),
            })
            .await;
        self.metrics_collector.record_event_published(
            MATCH_FOUND_EVENT,
            published.is_ok(),
            started.elapsed(),
        );
        if let Err(e) = published {
            warn!("Failed to announce match {}: {}", room_id, e);
        }

        self.update_stats(|stats| stats.matches_formed += 1);

        MatchResult::Matched {
            room_id,
            players,
            is_mock: false,
        }
    }

    async fn fall_back(&self, player: QueuePlayer) -> Result<MatchResult> {
        if !self.fallback.is_enabled() {
            return Ok(MatchResult::Waiting);
        }

        if self.pool_size().await? != 1 {
            return Ok(MatchResult::Waiting);
        }

        self.remove_players(&[player.id.as_str()]).await?;

        let result = self
            .fallback
            .mock_match(&player, self.clock.now_ms())
            .unwrap_or(MatchResult::Waiting);

        if let Some(room_id) = result.room_id() {
            info!(
                "Mock match - room_id: '{}', player_id: '{}'",
                room_id, player.id
            );
            self.update_stats(|stats| stats.mock_matches += 1);
        }

        Ok(result)
    }

    /// Publish the current pool size; failures are only logged
    async fn announce_pool_size(&self) {
        let total = match self.pool_size().await {
            Ok(total) => total,
            Err(e) => {
                warn!("Failed to read pool size for announcement: {}", e);
                return;
            }
        };

        let started = Instant::now();
        let published = self
            .event_publisher
            .publish_queue_update(QueueUpdate { total })
            .await;
        self.metrics_collector.record_event_published(
            QUEUE_UPDATE_EVENT,
            published.is_ok(),
            started.elapsed(),
        );
        if let Err(e) = published {
            warn!("Failed to announce pool size {}: {}", total, e);
        }
    }

    fn report_unusable(&self, player_id: &str, record: &PlayerRecord) {
        match record {
            PlayerRecord::Corrupt(e) => warn!("{}", e),
            PlayerRecord::Stale(player) => warn!(
                "Dropping stale pool entry - player_id: '{}', joined_at: {}",
                player_id, player.joined_at
            ),
            PlayerRecord::Absent => info!(
                "Dropping pool entry without metadata - player_id: '{}'",
                player_id
            ),
            PlayerRecord::Live(_) => {}
        }
    }

    fn update_stats(&self, update: impl FnOnce(&mut CoordinatorStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::OpponentRoster;
    use crate::events::MockEventPublisher;
    use crate::queue::clock::ManualClock;
    use crate::store::MemoryQueueStore;
    use crate::types::OpponentProfile;
    use crate::utils::MOCK_ROOM_PREFIX;

    const QUEUE: &str = "cza:matchmaking:queue";

    struct Harness {
        coordinator: QueueCoordinator,
        store: Arc<MemoryQueueStore>,
        publisher: Arc<MockEventPublisher>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = Arc::new(MemoryQueueStore::with_clock(clock.clone()));
        let publisher = Arc::new(MockEventPublisher::new());
        let coordinator = QueueCoordinator::new(store.clone(), publisher.clone())
            .with_clock(clock.clone());

        Harness {
            coordinator,
            store,
            publisher,
            clock,
        }
    }

    fn join(id: &str) -> JoinRequest {
        JoinRequest::new(id, Some(format!("{}-name", id)))
    }

    #[tokio::test]
    async fn test_repeat_enroll_keeps_one_entry() {
        let h = harness();

        let first = h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(250));
        let second = h.coordinator.enroll(join("0xa")).await.unwrap();

        assert!(first.is_waiting());
        assert!(second.is_waiting());
        assert_eq!(h.store.members(QUEUE), vec!["0xa".to_string()]);
        assert_eq!(h.store.score_of(QUEUE, "0xa"), Some(1_000_250));
    }

    #[tokio::test]
    async fn test_second_player_gets_match_opponent_first() {
        let h = harness();

        let first = h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(10));
        let second = h.coordinator.enroll(join("0xb")).await.unwrap();

        assert!(first.is_waiting());
        let players = second.players().unwrap();
        assert_eq!(players[0].id, "0xa");
        assert_eq!(players[0].joined_at, 1_000_000);
        assert_eq!(players[1].id, "0xb");
        assert_eq!(players[1].joined_at, 1_000_010);
        assert_eq!(second.outcome(), "matched");

        let announced = h.publisher.match_found_events();
        assert_eq!(announced.len(), 1);
        assert_eq!(Some(announced[0].room_id.as_str()), second.room_id());
        assert_eq!(&announced[0].players, players);

        assert!(h.store.members(QUEUE).is_empty());
        assert_eq!(h.publisher.queue_totals().last(), Some(&0));
    }

    #[tokio::test]
    async fn test_third_player_does_not_overtake() {
        let h = harness();

        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(1));
        // Put 0xb directly behind 0xa without triggering a pairing
        h.store
            .ordered_insert(QUEUE, h.clock.now_ms(), "0xb")
            .await
            .unwrap();
        h.clock.advance(Duration::from_millis(1));

        let third = h.coordinator.enroll(join("0xc")).await.unwrap();

        assert!(third.is_waiting());
        assert_eq!(
            h.store.members(QUEUE),
            vec!["0xa".to_string(), "0xb".to_string(), "0xc".to_string()]
        );
        assert!(h.publisher.match_found_events().is_empty());
    }

    #[tokio::test]
    async fn test_stale_opponent_is_removed() {
        let h = harness();

        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(DEFAULT_ENTRY_TTL + Duration::from_millis(1));
        h.publisher.clear_events();

        let result = h.coordinator.enroll(join("0xb")).await.unwrap();

        assert!(result.is_waiting());
        assert_eq!(h.store.members(QUEUE), vec!["0xb".to_string()]);
        assert_eq!(h.publisher.queue_totals().last(), Some(&1));
        assert_eq!(h.coordinator.stats().stale_removed, 1);
    }

    #[tokio::test]
    async fn test_entry_at_exact_ttl_still_matches() {
        let h = harness();

        h.coordinator.enroll(join("0xa")).await.unwrap();
        // Keep the record in the store past the staleness window
        let record = h
            .store
            .batch_get(&[h.coordinator.settings().keys.player_key("0xa")])
            .await
            .unwrap();
        h.store
            .put_with_expiry(
                "cza:matchmaking:player:0xa",
                record[0].as_deref().unwrap(),
                DEFAULT_ENTRY_TTL + Duration::from_secs(1),
            )
            .await
            .unwrap();
        h.clock.advance(DEFAULT_ENTRY_TTL);

        let result = h.coordinator.enroll(join("0xb")).await.unwrap();
        assert_eq!(result.outcome(), "matched");
    }

    #[tokio::test]
    async fn test_corrupt_opponent_record_treated_as_absent() {
        let h = harness();

        h.store
            .execute(
                StoreBatch::new()
                    .ordered_insert(QUEUE, 10, "0xbroken")
                    .put_with_expiry(
                        "cza:matchmaking:player:0xbroken",
                        r#"{"id":"0xbroken","username":null}"#.to_string(),
                        DEFAULT_ENTRY_TTL,
                    ),
            )
            .await
            .unwrap();

        let result = h.coordinator.enroll(join("0xa")).await.unwrap();

        assert!(result.is_waiting());
        assert_eq!(h.store.members(QUEUE), vec!["0xa".to_string()]);
        assert_eq!(h.coordinator.stats().stale_removed, 1);
    }

    #[tokio::test]
    async fn test_missing_own_record_removes_caller() {
        let h = harness();

        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(5));

        // Store drops every record the moment it is written
        let settings = QueueSettings {
            entry_ttl: Duration::ZERO,
            ..QueueSettings::default()
        };
        let coordinator = h.coordinator.clone().with_settings(settings);
        let result = coordinator.enroll(join("0xb")).await.unwrap();

        assert!(result.is_waiting());
        assert!(h.store.members(QUEUE).is_empty());
        assert_eq!(coordinator.stats().stale_removed, 2);
    }

    #[tokio::test]
    async fn test_identity_round_trip() {
        let h = harness();
        let odd_id = "0xAbC-Ünïcode ✓";
        let odd_name = "  Spaced  Name  ";

        h.coordinator
            .enroll(JoinRequest::new(odd_id, Some(odd_name.to_string())))
            .await
            .unwrap();
        h.clock.advance(Duration::from_millis(1));
        let result = h
            .coordinator
            .enroll(JoinRequest::new("0xOTHER", None))
            .await
            .unwrap();

        let players = result.players().unwrap();
        assert_eq!(players[0].id, odd_id);
        assert_eq!(players[0].username.as_deref(), Some(odd_name));
        assert_eq!(players[1].id, "0xOTHER");
        assert_eq!(players[1].username, None);
    }

    #[tokio::test]
    async fn test_blank_player_id_rejected_without_side_effects() {
        let h = harness();

        for id in ["", "   ", "\t\n"] {
            let err = h.coordinator.enroll(join(id)).await.unwrap_err();
            assert!(MatchmakingError::is_invalid_input(&err));
        }

        assert_eq!(h.store.mutation_count(), 0);
        assert!(h.publisher.get_published_events().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let h = harness();
        h.store.set_online(false);

        let err = h.coordinator.enroll(join("0xa")).await.unwrap_err();
        assert!(MatchmakingError::is_infrastructure(&err));
    }

    #[tokio::test]
    async fn test_publisher_failure_does_not_fail_enroll() {
        let h = harness();
        h.publisher.set_failing(true);

        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(1));
        let result = h.coordinator.enroll(join("0xb")).await.unwrap();

        assert_eq!(result.outcome(), "matched");
        assert!(h.store.members(QUEUE).is_empty());
        assert!(h.publisher.get_published_events().is_empty());
    }

    #[tokio::test]
    async fn test_mock_fallback_for_lone_player() {
        let h = harness();
        let caller_id = "0x4B3D9D1F0FCB53CD86AED9DDF3AABC7F7BE47C39";
        let coordinator = h
            .coordinator
            .clone()
            .with_fallback(PairingFallbackPolicy::mock_opponent());

        let result = coordinator
            .enroll(JoinRequest::new(caller_id, None))
            .await
            .unwrap();

        match &result {
            MatchResult::Matched {
                room_id,
                players,
                is_mock,
            } => {
                assert!(*is_mock);
                assert!(room_id.starts_with(MOCK_ROOM_PREFIX));
                assert_ne!(players[0].id.to_lowercase(), caller_id.to_lowercase());
                assert_eq!(players[1].id, caller_id);
            }
            MatchResult::Waiting => panic!("expected a mock match"),
        }

        assert!(h.store.members(QUEUE).is_empty());
        assert!(h.publisher.match_found_events().is_empty());
        assert_eq!(coordinator.stats().mock_matches, 1);
    }

    #[tokio::test]
    async fn test_mock_fallback_waits_when_others_queued() {
        let h = harness();
        let roster = OpponentRoster::new(vec![OpponentProfile {
            id: "0xbot".to_string(),
            username: "Bot".to_string(),
        }])
        .unwrap();
        let coordinator = h
            .coordinator
            .clone()
            .with_fallback(PairingFallbackPolicy::MockOpponent(Arc::new(roster)));

        h.store.ordered_insert(QUEUE, 1, "0xa").await.unwrap();
        h.store.ordered_insert(QUEUE, 2, "0xb").await.unwrap();

        let result = coordinator.enroll(join("0xc")).await.unwrap();
        assert!(result.is_waiting());
        assert_eq!(h.store.members(QUEUE).len(), 3);
    }

    fn queued(id: &str, joined_at: i64) -> QueuePlayer {
        QueuePlayer {
            id: id.to_string(),
            username: None,
            joined_at,
        }
    }

    #[tokio::test]
    async fn test_claim_requires_both_members() {
        let h = harness();
        let (a, b) = (queued("0xa", 1), queued("0xb", 2));
        h.store.ordered_insert(QUEUE, 1, "0xa").await.unwrap();
        h.store.ordered_insert(QUEUE, 2, "0xb").await.unwrap();

        assert!(h.coordinator.claim_pair(&a, &b).await.unwrap());
        assert!(h.store.members(QUEUE).is_empty());

        // A second claimer on the same pair loses
        h.publisher.clear_events();
        assert!(!h.coordinator.claim_pair(&a, &b).await.unwrap());
        assert!(h.publisher.queue_totals().is_empty());
    }

    #[tokio::test]
    async fn test_partial_claim_restores_removed_member() {
        let h = harness();
        let (a, b) = (queued("0xa", 1), queued("0xb", 2));
        h.store.ordered_insert(QUEUE, 1, "0xa").await.unwrap();

        assert!(!h.coordinator.claim_pair(&a, &b).await.unwrap());
        assert_eq!(h.store.members(QUEUE), vec!["0xa".to_string()]);
        assert_eq!(h.store.score_of(QUEUE, "0xa"), Some(1));
    }

    /// Store that lets a concurrent enrollment take a pool member right
    /// before the n-th single-member removal
    struct RacingStore {
        inner: Arc<MemoryQueueStore>,
        removals: std::sync::atomic::AtomicUsize,
        steal_before: usize,
        stolen: String,
    }

    impl RacingStore {
        fn new(inner: Arc<MemoryQueueStore>, steal_before: usize, stolen: &str) -> Self {
            Self {
                inner,
                removals: std::sync::atomic::AtomicUsize::new(0),
                steal_before,
                stolen: stolen.to_string(),
            }
        }
    }

    #[async_trait::async_trait]
    impl QueueStore for RacingStore {
        async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<()> {
            self.inner.ordered_insert(key, score, member).await
        }

        async fn ordered_remove(&self, key: &str, members: &[String]) -> Result<usize> {
            let call = self
                .removals
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            if call == self.steal_before {
                self.inner
                    .ordered_remove(key, &[self.stolen.clone()])
                    .await?;
            }
            self.inner.ordered_remove(key, members).await
        }

        async fn ordered_range_by_rank(
            &self,
            key: &str,
            start: isize,
            stop: isize,
        ) -> Result<Vec<String>> {
            self.inner.ordered_range_by_rank(key, start, stop).await
        }

        async fn ordered_count(&self, key: &str) -> Result<u64> {
            self.inner.ordered_count(key).await
        }

        async fn put_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
            self.inner.put_with_expiry(key, value, ttl).await
        }

        async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
            self.inner.batch_get(keys).await
        }

        async fn execute(&self, batch: StoreBatch) -> Result<()> {
            self.inner.execute(batch).await
        }

        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    fn racing_coordinator(h: &Harness, steal_before: usize, stolen: &str) -> QueueCoordinator {
        let racing = Arc::new(RacingStore::new(h.store.clone(), steal_before, stolen));
        QueueCoordinator::new(racing, h.publisher.clone()).with_clock(h.clock.clone())
    }

    #[tokio::test]
    async fn test_caller_stays_queued_when_opponent_taken_mid_claim() {
        let h = harness();
        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(10));

        // 0xa leaves the pool between 0xb's range read and its claim
        let coordinator = racing_coordinator(&h, 1, "0xa");
        let result = coordinator.enroll(join("0xb")).await.unwrap();

        assert!(result.is_waiting());
        assert_eq!(h.store.members(QUEUE), vec!["0xb".to_string()]);
        assert_eq!(h.store.score_of(QUEUE, "0xb"), Some(1_000_010));
        assert!(h.publisher.match_found_events().is_empty());

        // 0xa comes back and pairs with the still-waiting 0xb
        h.clock.advance(Duration::from_millis(10));
        let rematch = h.coordinator.enroll(join("0xa")).await.unwrap();
        let players = rematch.players().unwrap();
        assert_eq!(players[0].id, "0xb");
        assert_eq!(players[1].id, "0xa");
    }

    #[tokio::test]
    async fn test_first_member_restored_when_second_taken_mid_claim() {
        let h = harness();
        h.coordinator.enroll(join("0xa")).await.unwrap();
        h.clock.advance(Duration::from_millis(10));

        // 0xa is removed by the claim, then 0xb vanishes before its own removal
        let coordinator = racing_coordinator(&h, 2, "0xb");
        let result = coordinator.enroll(join("0xb")).await.unwrap();

        assert!(result.is_waiting());
        assert_eq!(h.store.members(QUEUE), vec!["0xa".to_string()]);
        assert_eq!(h.store.score_of(QUEUE, "0xa"), Some(1_000_000));
        assert!(h.publisher.match_found_events().is_empty());
    }

    #[tokio::test]
    async fn test_pool_size_and_snapshot() {
        let h = harness();
        h.coordinator.enroll(join("0xa")).await.unwrap();

        assert_eq!(h.coordinator.pool_size().await.unwrap(), 1);
        assert_eq!(h.coordinator.snapshot().await.unwrap().total, 1);
        assert_eq!(h.coordinator.metrics().queue().pool_size.get(), 1);
    }
}
