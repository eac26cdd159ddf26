//! Wires the C1-C9 components into the C10 API server (§4.10): builds the
//! overlay swarm, the local stores, every controller, and the tonic
//! `Server` that multiplexes the five service contracts behind one
//! listener.

use crate::auth::{AllowAllAuthorizer, AuthInterceptor};
use crate::config::Resolved;
use crate::grpc::dirnode::routing_service_server::RoutingServiceServer;
use crate::grpc::dirnode::search_service_server::SearchServiceServer;
use crate::grpc::dirnode::sign_service_server::SignServiceServer;
use crate::grpc::dirnode::store_service_server::StoreServiceServer;
use crate::grpc::dirnode::sync_service_server::SyncServiceServer;
use crate::grpc::dirnode::FILE_DESCRIPTOR_SET;
use crate::grpc::routing::RoutingServiceImpl;
use crate::grpc::search::SearchServiceImpl;
use crate::grpc::sign::SignServiceImpl;
use crate::grpc::store::StoreServiceImpl;
use crate::grpc::sync::SyncServiceImpl;
use crate::remote::GrpcRemoteConnector;
use dirnode_routing::{LocalLabelIndex, ProviderLayer, RemoteCache, RoutingController, PROVIDER_TTL};
use dirnode_search::SearchIndex;
use dirnode_sign::SignController;
use dirnode_store::{BlobStore, SledBackend};
use dirnode_sync::SyncEngine;
use libp2p::{identity, Multiaddr, PeerId};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server as TonicServer;
use tracing::{info, warn};

/// Remote-cache capacity per striped shard (§4.5/§4.6 "bounded ... evicts
/// LRU").
const REMOTE_CACHE_CAPACITY_PER_STRIPE: usize = 4096;
/// Re-announce sweep cadence derived from `routing.refresh_interval`
/// default of provider TTL/2 (§6).
fn reannounce_interval(resolved: &Resolved) -> Duration {
    match resolved.routing_refresh_interval_secs {
        Some(secs) => Duration::from_secs(secs),
        None => PROVIDER_TTL / 2,
    }
}

pub struct Server {
    resolved: Resolved,
}

impl Server {
    pub fn new(resolved: Resolved) -> Self {
        Server { resolved }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let resolved = &self.resolved;

        let base_dir = resolved.routing_datastore_dir.clone();
        let blob_store = Arc::new(BlobStore::new(Arc::new(open_blob_backend(base_dir.as_deref())?)));
        let search_index = Arc::new(open_search_index(resolved.database_sqlite_path.as_deref())?);
        let label_index = Arc::new(open_label_index(base_dir.as_deref())?);

        let keypair = load_or_generate_keypair(resolved.routing_key_path.as_deref())?;
        let local_peer_id = PeerId::from(keypair.public()).to_string();
        info!(peer_id = %local_peer_id, "node identity established");

        let listen_addr: Multiaddr = resolved
            .routing_listen_address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid routing.listen_address: {e}"))?;
        let swarm = dirnode_routing::swarm::build_swarm(keypair, listen_addr)
            .map_err(|e| anyhow::anyhow!("failed to build overlay swarm: {e}"))?;

        let (command_tx, command_rx) = tokio::sync::mpsc::channel(256);
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
        tokio::spawn(dirnode_routing::swarm::run(swarm, command_rx, event_tx));

        for peer in &resolved.routing_bootstrap_peers {
            match peer.parse::<Multiaddr>() {
                Ok(addr) => {
                    let _ = command_tx.send(dirnode_routing::swarm::SwarmCommand::Dial(addr)).await;
                }
                Err(e) => warn!(peer, "skipping unparsable bootstrap peer: {e}"),
            }
        }

        let remote_cache = Arc::new(RemoteCache::new(REMOTE_CACHE_CAPACITY_PER_STRIPE, PROVIDER_TTL));
        let provider_layer = Arc::new(ProviderLayer::new(command_tx.clone(), remote_cache.clone()));

        if resolved.routing_gossipsub_enabled {
            let remote_cache_for_events = remote_cache.clone();
            tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    handle_swarm_event(event, &remote_cache_for_events);
                }
            });
        } else {
            // DHT-only mode (§4.6 "only the DHT pull path is used"):
            // still drain events so ProvidersFound observations keep
            // landing in the remote cache, just never feed gossip
            // announcements into it (there are none, since this node
            // never subscribes' peers publish to it anyway).
            tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        }

        let reannounce_layer = provider_layer.clone();
        let reannounce_every = reannounce_interval(resolved);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reannounce_every);
            loop {
                ticker.tick().await;
                reannounce_layer.reannounce_sweep().await;
            }
        });

        let routing_controller = Arc::new(RoutingController::new(
            blob_store.clone(),
            label_index.clone(),
            provider_layer,
            remote_cache,
            command_tx,
            local_peer_id,
        ));

        let sync_store = Arc::new(open_sync_store(base_dir.as_deref())?);
        let sync_engine = SyncEngine::new(
            blob_store.clone(),
            search_index.clone(),
            label_index,
            sync_store,
            Arc::new(GrpcRemoteConnector),
        );
        sync_engine.resume_all()?;

        let sign_controller = Arc::new(SignController::new(blob_store.clone()));

        let store_service = StoreServiceServer::new(StoreServiceImpl { store: blob_store, search: search_index.clone() });
        let routing_service = RoutingServiceServer::new(RoutingServiceImpl { controller: routing_controller });
        let search_service = SearchServiceServer::new(SearchServiceImpl { index: search_index });
        let sync_service = SyncServiceServer::new(SyncServiceImpl { engine: sync_engine });
        let sign_service = SignServiceServer::new(SignServiceImpl { controller: sign_controller });

        let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter.set_serving::<StoreServiceServer<StoreServiceImpl>>().await;
        health_reporter.set_serving::<RoutingServiceServer<RoutingServiceImpl>>().await;
        health_reporter.set_serving::<SearchServiceServer<SearchServiceImpl>>().await;
        health_reporter.set_serving::<SyncServiceServer<SyncServiceImpl>>().await;
        health_reporter.set_serving::<SignServiceServer<SignServiceImpl>>().await;

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;

        let authorizer = Arc::new(AllowAllAuthorizer);
        let interceptor = AuthInterceptor::from_config(resolved, authorizer);

        if let Some(health_addr) = resolved.health_check_address {
            tokio::spawn(async move {
                if let Err(e) = serve_healthz(health_addr).await {
                    warn!("health endpoint exited: {e}");
                }
            });
        }

        info!(addr = %resolved.listen_address, "dirnoded listening");
        TonicServer::builder()
            .layer(tonic::service::interceptor(interceptor))
            .add_service(health_service)
            .add_service(reflection_service)
            .add_service(store_service)
            .add_service(routing_service)
            .add_service(search_service)
            .add_service(sync_service)
            .add_service(sign_service)
            .serve_with_shutdown(resolved.listen_address, shutdown_signal())
            .await?;

        Ok(())
    }
}

/// The bare `/healthz` liveness endpoint (§6 "health_check_address"):
/// one `TcpListener` accept loop, no web framework, every connection gets
/// a fixed `200 OK` and is closed.
async fn serve_healthz(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint listening");
    loop {
        let (mut socket, _) = listener.accept().await?;
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut buf = [0u8; 1024];
            // Drain whatever the client sent so the response isn't racing
            // an unread request on connections that keep the socket open.
            let _ = socket.read(&mut buf).await;
            let body = b"OK";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.write_all(body).await;
            let _ = socket.shutdown().await;
        });
    }
}

/// Waits for ctrl-c so the gRPC listener can drain in-flight requests
/// before the process exits, mirroring the shutdown-broadcast pattern the
/// teacher drives its TCP accept loop with.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received shutdown signal");
    }
}

fn handle_swarm_event(event: dirnode_routing::swarm::SwarmEvent, remote_cache: &dirnode_routing::RemoteCache) {
    use dirnode_routing::swarm::SwarmEvent;
    match event {
        SwarmEvent::Announcement(announcement) => match announcement.op {
            dirnode_routing::AnnouncementOp::Announce => {
                remote_cache.observe(
                    &announcement.peer_id,
                    Some(announcement.cid),
                    announcement.labels,
                    dirnode_routing::Source::Gossip,
                );
            }
            // A withdrawal is not itself a fresh observation; evict the
            // entry immediately rather than refreshing its freshness via
            // `observe` (§4.6 "withdrawals mark entries stale, evicted on
            // next sweep").
            dirnode_routing::AnnouncementOp::Withdraw => {
                remote_cache.mark_stale(&announcement.peer_id, Some(announcement.cid));
            }
        },
        SwarmEvent::ProvidersFound { .. } | SwarmEvent::PeerIdentified { .. } => {}
    }
}

fn open_blob_backend(base_dir: Option<&std::path::Path>) -> anyhow::Result<SledBackend> {
    Ok(match base_dir {
        Some(dir) => SledBackend::open(dir.join("blobs"))?,
        None => SledBackend::open(tempfile::tempdir()?.into_path())?,
    })
}

fn open_search_index(path: Option<&std::path::Path>) -> anyhow::Result<SearchIndex> {
    Ok(match path {
        Some(path) => SearchIndex::open(path)?,
        None => SearchIndex::open_in_memory()?,
    })
}

fn open_label_index(base_dir: Option<&std::path::Path>) -> anyhow::Result<LocalLabelIndex> {
    Ok(match base_dir {
        Some(dir) => LocalLabelIndex::open(dir.join("labels"))?,
        None => LocalLabelIndex::open(tempfile::tempdir()?.into_path())?,
    })
}

fn open_sync_store(base_dir: Option<&std::path::Path>) -> anyhow::Result<dirnode_sync::SyncStore> {
    Ok(match base_dir {
        Some(dir) => dirnode_sync::SyncStore::open(dir.join("syncs"))?,
        None => dirnode_sync::SyncStore::open_temporary()?,
    })
}

/// Load this node's identity keypair from `routing.key_path`, generating
/// and persisting a fresh ed25519 key on first run; an unset path means a
/// fresh, unpersisted keypair every start (§6 "routing.key_path").
fn load_or_generate_keypair(key_path: Option<&std::path::Path>) -> anyhow::Result<identity::Keypair> {
    let Some(path) = key_path else {
        return Ok(identity::Keypair::generate_ed25519());
    };

    if path.exists() {
        let bytes = std::fs::read(path)?;
        return Ok(identity::Keypair::from_protobuf_encoding(&bytes)?);
    }

    let keypair = identity::Keypair::generate_ed25519();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, keypair.to_protobuf_encoding()?)?;
    Ok(keypair)
}
