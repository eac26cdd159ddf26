//! The libp2p overlay: Kademlia (C5) and GossipSub (C6) driven by a single
//! background task. Following `terrain-gossip-net::transport::Transport`'s
//! shape, callers never touch the `Swarm` directly — they send
//! [`SwarmCommand`]s and receive [`SwarmEvent`]s over `mpsc` channels.

use crate::announcement::Announcement;
use futures::StreamExt;
use libp2p::kad::store::MemoryStore;
use libp2p::kad::{self, QueryId};
use libp2p::{gossipsub, identify, identity, kad::RecordKey, noise, tcp, yamux, Multiaddr, PeerId, Swarm};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const ANNOUNCEMENT_TOPIC: &str = "/dirnode/announcements/1";

#[derive(libp2p::swarm::NetworkBehaviour)]
pub struct DirnodeBehaviour {
    pub kademlia: kad::Behaviour<MemoryStore>,
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
}

pub enum SwarmCommand {
    StartProviding(RecordKey),
    StopProviding(RecordKey),
    GetProviders {
        key: RecordKey,
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    Publish(Vec<u8>),
    Dial(Multiaddr),
}

pub enum SwarmEvent {
    ProvidersFound { key: RecordKey, providers: Vec<PeerId> },
    Announcement(Announcement),
    PeerIdentified { peer_id: PeerId, listen_addrs: Vec<Multiaddr> },
}

/// Construct the combined behaviour and a ready-to-spawn swarm.
pub fn build_swarm(
    keypair: identity::Keypair,
    listen_addr: Multiaddr,
) -> Result<Swarm<DirnodeBehaviour>, Box<dyn std::error::Error + Send + Sync>> {
    let local_peer_id = PeerId::from(keypair.public());

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(1))
        .validation_mode(gossipsub::ValidationMode::Strict)
        .build()?;
    let gossipsub = gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        gossipsub_config,
    )?;

    let kademlia = kad::Behaviour::new(local_peer_id, MemoryStore::new(local_peer_id));

    let identify = identify::Behaviour::new(identify::Config::new(
        "/dirnode/1.0.0".to_string(),
        keypair.public(),
    ));

    let behaviour = DirnodeBehaviour { kademlia, gossipsub, identify };

    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
        .with_behaviour(|_| behaviour)?
        .build();

    swarm.listen_on(listen_addr)?;
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&gossipsub::IdentTopic::new(ANNOUNCEMENT_TOPIC))?;

    Ok(swarm)
}

/// Drives the swarm to completion. Spawned once per node; the only task
/// that ever calls a `Swarm` method, per §5's "no per-connection thread"
/// scheduling model.
pub async fn run(
    mut swarm: Swarm<DirnodeBehaviour>,
    mut commands: mpsc::Receiver<SwarmCommand>,
    events: mpsc::Sender<SwarmEvent>,
) {
    let mut pending_provider_queries: HashMap<QueryId, (RecordKey, oneshot::Sender<Vec<PeerId>>)> =
        HashMap::new();

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    SwarmCommand::StartProviding(key) => {
                        if let Err(e) = swarm.behaviour_mut().kademlia.start_providing(key) {
                            warn!("start_providing failed: {e}");
                        }
                    }
                    SwarmCommand::StopProviding(key) => {
                        swarm.behaviour_mut().kademlia.stop_providing(&key);
                    }
                    SwarmCommand::GetProviders { key, reply } => {
                        let query_id = swarm.behaviour_mut().kademlia.get_providers(key.clone());
                        pending_provider_queries.insert(query_id, (key, reply));
                    }
                    SwarmCommand::Publish(bytes) => {
                        let topic = gossipsub::IdentTopic::new(ANNOUNCEMENT_TOPIC);
                        if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, bytes) {
                            debug!("gossipsub publish failed (likely no peers yet): {e}");
                        }
                    }
                    SwarmCommand::Dial(addr) => {
                        if let Err(e) = swarm.dial(addr) {
                            warn!("dial failed: {e}");
                        }
                    }
                }
            }
            event = swarm.select_next_some() => {
                handle_swarm_event(event, &mut pending_provider_queries, &events).await;
            }
        }
    }
}

async fn handle_swarm_event(
    event: libp2p::swarm::SwarmEvent<DirnodeBehaviourEvent>,
    pending: &mut HashMap<QueryId, (RecordKey, oneshot::Sender<Vec<PeerId>>)>,
    events: &mpsc::Sender<SwarmEvent>,
) {
    match event {
        libp2p::swarm::SwarmEvent::NewListenAddr { address, .. } => {
            info!("routing overlay listening on {address}");
        }
        libp2p::swarm::SwarmEvent::Behaviour(DirnodeBehaviourEvent::Kademlia(
            kad::Event::OutboundQueryProgressed {
                id,
                result: kad::QueryResult::GetProviders(Ok(result)),
                ..
            },
        )) => {
            let providers = match result {
                kad::GetProvidersOk::FoundProviders { providers, .. } => {
                    providers.into_iter().collect()
                }
                kad::GetProvidersOk::FinishedWithNoAdditionalRecord { .. } => Vec::new(),
            };
            if let Some((key, reply)) = pending.remove(&id) {
                let _ = reply.send(providers.clone());
                let _ = events.send(SwarmEvent::ProvidersFound { key, providers }).await;
            }
        }
        libp2p::swarm::SwarmEvent::Behaviour(DirnodeBehaviourEvent::Gossipsub(
            gossipsub::Event::Message { message, .. },
        )) => {
            match Announcement::decode(&message.data) {
                Ok(announcement) => {
                    let _ = events.send(SwarmEvent::Announcement(announcement)).await;
                }
                Err(e) => debug!("dropping malformed announcement: {e}"),
            }
        }
        libp2p::swarm::SwarmEvent::Behaviour(DirnodeBehaviourEvent::Identify(
            identify::Event::Received { peer_id, info, .. },
        )) => {
            let _ = events
                .send(SwarmEvent::PeerIdentified {
                    peer_id,
                    listen_addrs: info.listen_addrs,
                })
                .await;
        }
        _ => {}
    }
}
