//! Two in-process nodes gossiping over an in-memory transport.
//!
//! Mirrors the wiring of `examples/original_source/cmd/testapp/main.go` (a
//! `kibitz.DB` behind a JSON-over-HTTP `Send`), but swaps the HTTP transport
//! for a direct in-memory registry lookup so the demo needs no sockets.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use meshgossip::{BoxError, GossipConfig, GossipDb, Notifier, PeerCarrier, PeerInfo, Transport};

/// The payload our two nodes exchange. In a real deployment this would also
/// carry application-specific fields alongside `info`, same as the original's
/// `HB{Info, SampleData}`.
#[derive(Debug, Clone)]
struct Heartbeat {
    info: Option<PeerInfo>,
}

impl PeerCarrier for Heartbeat {
    fn peer_info(&self) -> PeerInfo {
        self.info.clone().expect("peer info taken")
    }

    fn set_peer_info(&mut self, info: Option<PeerInfo>) {
        self.info = info;
    }
}

type Registry = Arc<Mutex<HashMap<String, Arc<GossipDb>>>>;

/// Delivers a probe directly to the target's `GossipDb`, as if it had arrived
/// over the wire and been handed to an HTTP endpoint.
struct InProcessTransport {
    registry: Registry,
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(
        &self,
        addr: &str,
        _timeout: Duration,
        my_info: PeerInfo,
    ) -> Result<Vec<Box<dyn PeerCarrier>>, BoxError> {
        let target = {
            let registry = self.registry.lock().unwrap();
            registry.get(addr).cloned()
        };
        let Some(target) = target else {
            return Err("no such peer registered".into());
        };

        let carrier = Heartbeat { info: Some(my_info) };
        target.update_sceptical(&carrier);

        let mut reports = Vec::new();
        target.for_all_data(|export| {
            reports.push(Box::new(Heartbeat {
                info: Some(PeerInfo {
                    server_id: export.id,
                    subsystem: export.subsystem,
                    environment: export.environment,
                    hostname: export.hostname,
                    datacenter: export.datacenter,
                    rack: export.rack,
                    net_info: export.net_info,
                    status_code: if export.is_up { 2 } else { 4 },
                    time_created: export.time_up,
                    time_checked: export.time_up,
                    time_last_up: export.time_up,
                    time_up_since: export.time_up,
                    time_conf: export.time_up,
                    via: String::new(),
                }),
            }) as Box<dyn PeerCarrier>);
        });

        Ok(reports)
    }
}

struct LoggingNotifier {
    name: &'static str,
}

impl Notifier for LoggingNotifier {
    fn notify(&self, id: &str, is_up: bool, is_same_subsystem: bool) {
        println!(
            "[{}] peer {id} is now {} (same subsystem: {is_same_subsystem})",
            self.name,
            if is_up { "UP" } else { "DOWN/DEAD" }
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

    let addr_a = "10.0.0.1:9001";
    let addr_b = "10.0.0.2:9002";

    let config_a = GossipConfig::new(
        "demo",
        Arc::new(InProcessTransport { registry: registry.clone() }),
        Arc::new(LoggingNotifier { name: "node-a" }),
    )
    .hostname("node-a.dc1.example.com")
    .port(9001)
    .local_addrs(vec!["10.0.0.1".parse::<IpAddr>().unwrap()])
    .seeds(vec![addr_b.to_string()])
    .build()
    .expect("valid config");

    let config_b = GossipConfig::new(
        "demo",
        Arc::new(InProcessTransport { registry: registry.clone() }),
        Arc::new(LoggingNotifier { name: "node-b" }),
    )
    .hostname("node-b.dc1.example.com")
    .port(9002)
    .local_addrs(vec!["10.0.0.2".parse::<IpAddr>().unwrap()])
    .build()
    .expect("valid config");

    let db_a = GossipDb::new(config_a);
    let db_b = GossipDb::new(config_b);

    registry.lock().unwrap().insert(addr_a.to_string(), db_a.clone());
    registry.lock().unwrap().insert(addr_b.to_string(), db_b.clone());

    db_a.start();
    db_b.start();

    tokio::time::sleep(Duration::from_secs(5)).await;

    println!("node-a sees {} peers", db_a.get_all().len());
    println!("node-b sees {} peers", db_b.get_all().len());

    db_a.stop().await;
    db_b.stop().await;
}
