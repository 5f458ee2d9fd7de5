//! The Peer Database: the three-map membership table, admission control, and
//! the externally-callable operations the host drives.
//!
//! Grounded on `examples/original_source/peerdb.go`, restructured around an
//! `RwLock`-guarded map set instead of a single coarse mutex, matching the
//! teacher's `Mutex<AddressBook>` + `Arc<Peer>` sharing pattern.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::candidate;
use crate::clock::{LogicalClock, LogicalTime};
use crate::config::GossipConfig;
use crate::constants::{FAST_INTERVAL, GOSSIP_INTERVAL, KEEPDOWN, KEEPLOST};
use crate::driver;
use crate::export::Export;
use crate::identity::SelfIdentity;
use crate::netmon::NetworkMonitor;
use crate::peer::{Peer, PeerStatus, StatusEdge};
use crate::peer_info::PeerInfo;
use crate::transport::{Notifier, PeerCarrier, Transport};

struct Maps {
    allpeers: HashMap<String, Arc<Peer>>,
    skeptical: HashMap<String, Arc<Peer>>,
    kibitzers: HashMap<String, Arc<Peer>>,
}

impl Maps {
    fn new() -> Self {
        Maps {
            allpeers: HashMap::new(),
            skeptical: HashMap::new(),
            kibitzers: HashMap::new(),
        }
    }

    fn find(&self, id: &str) -> Option<&Arc<Peer>> {
        self.allpeers.get(id).or_else(|| self.skeptical.get(id))
    }
}

/// The Peer Database. Cheap to clone (it is always held behind an `Arc`);
/// `new` returns it pre-wrapped since the Driver task needs shared ownership.
pub struct GossipDb {
    identity: SelfIdentity,
    clock: LogicalClock,
    netmon: NetworkMonitor,
    system: String,
    environment: String,
    promiscuous: bool,
    seeds: Vec<String>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    boot: LogicalTime,
    maps: RwLock<Maps>,
    stop: Notify,
    driver_task: Mutex<Option<JoinHandle<()>>>,
}

impl GossipDb {
    /// Build a new, un-started database from `config`.
    pub fn new(config: GossipConfig) -> Arc<GossipDb> {
        let identity = SelfIdentity::new(
            &config.system,
            &config.environment,
            config.port,
            config.hostname.as_deref(),
            config.datacenter.as_deref(),
            config.rack.as_deref(),
            config.id.as_deref(),
            &config.local_addrs,
        );

        let netmon = NetworkMonitor::new();
        for dom in identity.own_domains() {
            netmon.add(dom);
        }

        let clock = LogicalClock::new();
        let boot = clock.now();

        tracing::info!(
            id = %identity.server_id,
            dc = %identity.datacenter,
            rack = %identity.rack,
            "gossip database initialized"
        );

        Arc::new(GossipDb {
            identity,
            clock,
            netmon,
            system: config.system,
            environment: config.environment,
            promiscuous: config.promiscuous,
            seeds: config.seeds,
            transport: config.transport,
            notifier: config.notifier,
            boot,
            maps: RwLock::new(Maps::new()),
            stop: Notify::new(),
            driver_task: Mutex::new(None),
        })
    }

    /// Launch the background Gossip Driver. A no-op if already started.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.driver_task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let db = self.clone();
        *task = Some(tokio::spawn(async move { driver::run(db).await }));
    }

    /// Signal the Driver to stop and wait for it to quiesce.
    pub async fn stop(&self) {
        self.stop.notify_one();
        let handle = self.driver_task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Apply a third-party peer report, taking ownership of `carrier` so it
    /// can be stashed on the record as `userData` once merged.
    pub fn update(&self, carrier: Box<dyn PeerCarrier>) {
        let info = carrier.peer_info();
        if !self.is_ok(&info) {
            metrics::counter!("gossip_reports_rejected_total").increment(1);
            return;
        }
        metrics::counter!("gossip_reports_accepted_total").increment(1);

        self.clock.update(info.time_created);
        self.clock.update(info.time_checked);

        let peer = {
            let mut maps = self.maps.write().unwrap();
            match maps.find(&info.server_id).cloned() {
                Some(peer) => {
                    if peer.status() == PeerStatus::Sceptical {
                        self.upgrade_locked(&mut maps, &peer);
                    }
                    peer
                }
                None => {
                    tracing::info!(peer = %info.server_id, "discovered new peer");
                    let peer = Arc::new(Peer::new(info, PeerStatus::Unknown));
                    maps.allpeers.insert(peer.id.clone(), peer.clone());
                    if peer.subsystem() == self.system {
                        maps.kibitzers.insert(peer.id.clone(), peer.clone());
                    }
                    return;
                }
            }
        };

        let edge = peer.update(carrier, self.identity.own_domains(), &self.identity.server_id);
        self.dispatch_edge(&peer, edge);
    }

    /// Apply a report the peer sent us directly, unsolicited. Trust is not yet
    /// established, so an already-known peer's timestamps are left untouched.
    pub fn update_sceptical(&self, carrier: &dyn PeerCarrier) {
        let info = carrier.peer_info();
        if !self.is_ok(&info) {
            metrics::counter!("gossip_reports_rejected_total").increment(1);
            return;
        }
        metrics::counter!("gossip_reports_accepted_total").increment(1);

        let mut maps = self.maps.write().unwrap();
        if maps.find(&info.server_id).is_none() {
            tracing::debug!(peer = %info.server_id, "add new sceptical peer");
            let peer = Arc::new(Peer::new(info, PeerStatus::Sceptical));
            maps.skeptical.insert(peer.id.clone(), peer);
        }
    }

    /// Record a successful local probe of `id`. A miss is silently ignored:
    /// the Driver may race a concurrent `Cleanup`.
    pub fn peer_up(&self, id: &str) {
        let peer = {
            let mut maps = self.maps.write().unwrap();
            let peer = match maps.find(id) {
                Some(peer) => peer.clone(),
                None => return,
            };
            if peer.status() == PeerStatus::Sceptical {
                self.upgrade_locked(&mut maps, &peer);
            }
            peer
        };

        metrics::counter!("gossip_probe_success_total").increment(1);
        let edge = peer.set_is_up(self.clock.inc());
        self.dispatch_edge(&peer, edge);
    }

    /// Record a failed local probe of `id`.
    pub fn peer_dn(&self, id: &str) {
        let (peer, killed) = {
            let mut maps = self.maps.write().unwrap();
            let peer = match maps.find(id) {
                Some(peer) => peer.clone(),
                None => return,
            };
            if peer.status() == PeerStatus::Sceptical {
                self.remove_locked(&mut maps, &peer);
                (peer, true)
            } else {
                (peer, false)
            }
        };

        metrics::counter!("gossip_probe_failures_total").increment(1);
        let edge = if killed {
            peer.kill()
        } else {
            peer.set_maybe_dn(self.clock.inc())
        };
        self.dispatch_edge(&peer, edge);
    }

    /// Look up one peer record.
    pub fn get(&self, id: &str) -> Option<Arc<Peer>> {
        self.maps.read().unwrap().find(id).cloned()
    }

    /// All peers we have corroborated information about (excludes `skeptical`
    /// and excludes ourselves).
    pub fn get_all(&self) -> Vec<Arc<Peer>> {
        self.maps.read().unwrap().allpeers.values().cloned().collect()
    }

    /// Invoke `callback` for every corroborated peer's current [`Export`].
    pub fn for_all_data(&self, mut callback: impl FnMut(Export)) {
        let peers: Vec<Arc<Peer>> = self.maps.read().unwrap().allpeers.values().cloned().collect();
        for peer in peers {
            callback(peer.export(&self.identity.rack, &self.identity.datacenter));
        }
    }

    /// This node's own self-reported [`PeerInfo`], as sent on every probe.
    pub fn my_info(&self) -> PeerInfo {
        let now = self.clock.inc();
        let mut info = PeerInfo {
            server_id: self.identity.server_id.clone(),
            subsystem: self.system.clone(),
            environment: self.environment.clone(),
            hostname: self.identity.hostname.clone(),
            datacenter: self.identity.datacenter.clone(),
            rack: self.identity.rack.clone(),
            net_info: self.identity.net_info.clone(),
            status_code: 0,
            time_created: now,
            time_checked: now,
            time_last_up: now,
            time_up_since: self.boot,
            time_conf: self.boot,
            via: ".".to_string(),
        };
        info.set_status(PeerStatus::Up);
        info
    }

    /// A flattened [`Export`] describing this node itself.
    pub fn get_export_self(&self) -> Export {
        Export {
            id: self.identity.server_id.clone(),
            net_info: self.identity.net_info.clone(),
            subsystem: self.system.clone(),
            environment: self.environment.clone(),
            hostname: self.identity.hostname.clone(),
            rack: self.identity.rack.clone(),
            datacenter: self.identity.datacenter.clone(),
            best_addr: self.identity.net_info.last().map(|ni| ni.addr.clone()).unwrap_or_default(),
            is_up: true,
            time_up: self.clock.inc(),
            is_same_rack: true,
            is_same_dc: true,
        }
    }

    pub fn is_own_addr(&self, addr: &str) -> bool {
        self.identity.is_own_addr(addr)
    }

    pub fn dom_ok(&self, dom: &str) -> bool {
        self.identity.dom_ok(dom)
    }

    pub fn rack(&self) -> &str {
        &self.identity.rack
    }

    pub fn datacenter(&self) -> &str {
        &self.identity.datacenter
    }

    pub fn host(&self) -> &str {
        &self.identity.hostname
    }

    pub fn env(&self) -> &str {
        &self.environment
    }

    pub fn id(&self) -> &str {
        &self.identity.server_id
    }

    pub fn clock_now(&self) -> LogicalTime {
        self.clock.inc()
    }

    pub fn clock_boot(&self) -> LogicalTime {
        self.boot
    }

    /// Walk `allpeers` and kill any peer whose info no longer satisfies
    /// [`GossipDb::is_ok`] (too old, or the environment/system no longer
    /// match after a config change).
    pub fn cleanup(&self) {
        let stale: Vec<Arc<Peer>> = {
            let mut maps = self.maps.write().unwrap();
            let stale: Vec<Arc<Peer>> = maps
                .allpeers
                .values()
                .filter(|p| !self.is_ok(&p.info()))
                .cloned()
                .collect();
            for peer in &stale {
                tracing::debug!(peer = %peer.id, "cleanup: removing stale peer");
                self.remove_locked(&mut maps, peer);
            }
            stale
        };

        for peer in stale {
            let edge = peer.kill();
            self.dispatch_edge(&peer, edge);
        }
    }

    fn is_ok(&self, info: &PeerInfo) -> bool {
        let now = self.clock.now();
        let keeplost = KEEPLOST.as_nanos() as u64;
        let keepdown = KEEPDOWN.as_nanos() as u64;

        if info.server_id == self.identity.server_id {
            return false;
        }
        if info.subsystem != self.system && !self.promiscuous {
            return false;
        }
        if info.environment != self.environment {
            return false;
        }
        if info.time_created < now.saturating_sub(keeplost) {
            return false;
        }
        if info.time_last_up < now.saturating_sub(keepdown) {
            return false;
        }
        true
    }

    fn upgrade_locked(&self, maps: &mut Maps, peer: &Arc<Peer>) {
        maps.skeptical.remove(&peer.id);
        maps.allpeers.insert(peer.id.clone(), peer.clone());
        if peer.subsystem() == self.system {
            maps.kibitzers.insert(peer.id.clone(), peer.clone());
        }
    }

    fn remove_locked(&self, maps: &mut Maps, peer: &Arc<Peer>) {
        maps.allpeers.remove(&peer.id);
        maps.skeptical.remove(&peer.id);
        maps.kibitzers.remove(&peer.id);
    }

    fn dispatch_edge(&self, peer: &Arc<Peer>, edge: Option<StatusEdge>) {
        let Some(edge) = edge else {
            return;
        };
        let is_up = matches!(edge, StatusEdge::Up);
        let is_same_subsystem = peer.subsystem() == self.system;
        let notifier = self.notifier.clone();
        let id = peer.id.clone();
        metrics::counter!("gossip_notify_total").increment(1);
        tokio::spawn(async move {
            notifier.notify(&id, is_up, is_same_subsystem);
        });
    }

    pub(crate) fn choose_peer(&self) -> Option<Arc<Peer>> {
        let maps = self.maps.read().unwrap();
        candidate::choose_peer(&maps.kibitzers, &maps.skeptical, &self.identity.datacenter)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn netmon(&self) -> &NetworkMonitor {
        &self.netmon
    }

    pub(crate) fn seeds(&self) -> &[String] {
        &self.seeds
    }

    pub(crate) async fn stop_notified(&self) {
        self.stop.notified().await;
    }

    pub(crate) fn next_interval(&self) -> Duration {
        let maps = self.maps.read().unwrap();
        if maps.kibitzers.is_empty() || !maps.skeptical.is_empty() {
            FAST_INTERVAL
        } else {
            GOSSIP_INTERVAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_info::NetInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[derive(Debug)]
    struct NopTransport;

    #[async_trait::async_trait]
    impl Transport for NopTransport {
        async fn send(
            &self,
            _addr: &str,
            _timeout: StdDuration,
            _my_info: PeerInfo,
        ) -> Result<Vec<Box<dyn PeerCarrier>>, crate::error::BoxError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        ups: AtomicUsize,
        downs: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, _id: &str, is_up: bool, _is_same_subsystem: bool) {
            if is_up {
                self.ups.fetch_add(1, Ordering::SeqCst);
            } else {
                self.downs.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Debug, Clone)]
    struct TestCarrier(Option<PeerInfo>);

    impl PeerCarrier for TestCarrier {
        fn peer_info(&self) -> PeerInfo {
            self.0.clone().expect("peer info taken")
        }
        fn set_peer_info(&mut self, info: Option<PeerInfo>) {
            self.0 = info;
        }
    }

    fn remote_info(id: &str, subsystem: &str, time_created: u64) -> PeerInfo {
        PeerInfo {
            server_id: id.to_string(),
            subsystem: subsystem.to_string(),
            environment: "dev".to_string(),
            hostname: id.to_string(),
            datacenter: "dc1".to_string(),
            rack: String::new(),
            net_info: vec![NetInfo {
                addr: "10.0.0.9:80".into(),
                natdom: "dc1".into(),
            }],
            status_code: 2,
            time_created,
            time_checked: time_created,
            time_last_up: time_created,
            time_up_since: time_created,
            time_conf: time_created,
            via: String::new(),
        }
    }

    fn make_db(system: &str, notifier: Arc<CountingNotifier>) -> Arc<GossipDb> {
        let config = GossipConfig::new(system, Arc::new(NopTransport), notifier)
            .environment("dev")
            .build()
            .unwrap();
        GossipDb::new(config)
    }

    #[test]
    fn update_rejects_own_id() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let mut info = remote_info(db.id(), "sys", db.clock_now());
        info.server_id = db.id().to_string();
        let carrier = TestCarrier(Some(info));
        db.update(Box::new(carrier));
        assert!(db.get_all().is_empty());
    }

    #[test]
    fn update_admits_new_peer() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", now)));
        db.update(Box::new(carrier));
        assert!(db.get("peerA").is_some());
    }

    #[test]
    fn update_admits_new_peer_into_kibitzers_when_subsystem_matches() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", now)));
        db.update(Box::new(carrier));
        assert!(db.maps.read().unwrap().kibitzers.contains_key("peerA"));
    }

    #[test]
    fn update_rejects_mismatched_subsystem_unless_promiscuous() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "othersys", now)));
        db.update(Box::new(carrier));
        assert!(db.get("peerA").is_none());
    }

    #[test]
    fn update_sceptical_then_peer_up_promotes_out_of_skeptical() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", now)));
        db.update_sceptical(&carrier);
        assert_eq!(db.get("peerA").unwrap().status(), PeerStatus::Sceptical);

        db.peer_up("peerA");
        assert_eq!(db.get("peerA").unwrap().status(), PeerStatus::Up);
        assert!(db.get_all().iter().any(|p| p.id == "peerA"));
    }

    #[test]
    fn peer_dn_on_sceptical_peer_kills_and_removes() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", now)));
        db.update_sceptical(&carrier);
        db.peer_dn("peerA");
        assert!(db.get("peerA").is_none());
    }

    #[test]
    fn update_rejects_peer_with_stale_time_created() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        // time_created=1 is far older than now-KEEPLOST -> isOK rejects on arrival
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", 1)));
        db.update(Box::new(carrier));
        assert!(db.get("peerA").is_none());
    }

    #[test]
    fn cleanup_keeps_a_freshly_admitted_peer() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        let now = db.clock_now();
        let carrier = TestCarrier(Some(remote_info("peerA", "sys", now)));
        db.update(Box::new(carrier));
        assert!(db.get("peerA").is_some());
        db.cleanup();
        assert!(db.get("peerA").is_some());
    }

    #[test]
    fn peer_up_on_unknown_id_is_a_silent_no_op() {
        let notifier = Arc::new(CountingNotifier::default());
        let db = make_db("sys", notifier);
        db.peer_up("nobody");
        db.peer_dn("nobody");
    }

    // --- property tests (invariants of §8) ---

    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Action {
        Update { id: String, subsystem_ok: bool, age_minutes: i64 },
        UpdateSceptical { id: String, subsystem_ok: bool, age_minutes: i64 },
        PeerUp { id: String },
        PeerDn { id: String },
    }

    fn id_strategy() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["p0", "p1", "p2", "p3"]).prop_map(|s| s.to_string())
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            (id_strategy(), any::<bool>(), -20i64..20).prop_map(|(id, subsystem_ok, age_minutes)| {
                Action::Update { id, subsystem_ok, age_minutes }
            }),
            (id_strategy(), any::<bool>(), -20i64..20).prop_map(|(id, subsystem_ok, age_minutes)| {
                Action::UpdateSceptical { id, subsystem_ok, age_minutes }
            }),
            id_strategy().prop_map(|id| Action::PeerUp { id }),
            id_strategy().prop_map(|id| Action::PeerDn { id }),
        ]
    }

    /// A timestamp `age_minutes` in the past (negative = in the future),
    /// relative to the db's own logical clock.
    fn time_with_age(db: &GossipDb, age_minutes: i64) -> u64 {
        let now = db.clock_now() as i64;
        let nanos = age_minutes * 60_000_000_000;
        (now - nanos).max(0) as u64
    }

    proptest! {
        /// Invariants 1-3 of §8 must hold no matter what sequence of
        /// `Update`/`UpdateSceptical`/`PeerUp`/`PeerDn` calls a host makes.
        #[test]
        fn db_invariants_hold_after_arbitrary_action_sequence(
            actions in prop::collection::vec(action_strategy(), 0..40)
        ) {
            let notifier = Arc::new(CountingNotifier::default());
            let db = make_db("sys", notifier);

            for action in actions {
                match action {
                    Action::Update { id, subsystem_ok, age_minutes } => {
                        let subsystem = if subsystem_ok { "sys" } else { "othersys" };
                        let t = time_with_age(&db, age_minutes);
                        db.update(Box::new(TestCarrier(Some(remote_info(&id, subsystem, t)))));
                    }
                    Action::UpdateSceptical { id, subsystem_ok, age_minutes } => {
                        let subsystem = if subsystem_ok { "sys" } else { "othersys" };
                        let t = time_with_age(&db, age_minutes);
                        db.update_sceptical(&TestCarrier(Some(remote_info(&id, subsystem, t))));
                    }
                    Action::PeerUp { id } => db.peer_up(&id),
                    Action::PeerDn { id } => db.peer_dn(&id),
                }
            }

            let maps = db.maps.read().unwrap();

            for (id, peer) in maps.kibitzers.iter() {
                prop_assert!(maps.allpeers.contains_key(id));
                prop_assert_eq!(peer.subsystem().as_str(), "sys");
            }

            for id in maps.allpeers.keys() {
                prop_assert!(!maps.skeptical.contains_key(id));
            }

            for peer in maps.allpeers.values().chain(maps.skeptical.values()).chain(maps.kibitzers.values()) {
                prop_assert_ne!(peer.status(), PeerStatus::Dead);
            }
        }

        /// `isOK` (§4.5/§8 item 7) must agree exactly with its stated predicate.
        #[test]
        fn is_ok_matches_admission_predicate(
            same_id in any::<bool>(),
            subsystem_ok in any::<bool>(),
            promiscuous in any::<bool>(),
            env_ok in any::<bool>(),
            created_age_minutes in -20i64..20,
            lastup_age_minutes in -20i64..20,
        ) {
            let notifier = Arc::new(CountingNotifier::default());
            let config = GossipConfig::new("sys", Arc::new(NopTransport), notifier)
                .environment("dev")
                .promiscuous(promiscuous)
                .build()
                .unwrap();
            let db = GossipDb::new(config);

            let id = if same_id { db.id().to_string() } else { "other-peer".to_string() };
            let subsystem = if subsystem_ok { "sys" } else { "othersys" };
            let environment = if env_ok { "dev" } else { "prod" };

            let created = time_with_age(&db, created_age_minutes);
            let last_up = time_with_age(&db, lastup_age_minutes);

            let mut info = remote_info(&id, subsystem, created);
            info.environment = environment.to_string();
            info.time_last_up = last_up;

            let now = db.clock_now();
            let keeplost = crate::constants::KEEPLOST.as_nanos() as u64;
            let keepdown = crate::constants::KEEPDOWN.as_nanos() as u64;

            let expected = !same_id
                && (subsystem_ok || promiscuous)
                && env_ok
                && created >= now.saturating_sub(keeplost)
                && last_up >= now.saturating_sub(keepdown);

            prop_assert_eq!(db.is_ok(&info), expected);
        }
    }
}
