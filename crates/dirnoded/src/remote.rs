//! The sync engine's [`RemoteDirectory`]/[`RemoteConnector`] seam (§4.8
//! step 1 "discover a remote"), implemented as a thin gRPC client against
//! another node's own `StoreService`/`RoutingService`. This is internal
//! sync-engine plumbing, not the CLI-facing client library that §1 lists
//! as out of scope — it never leaves this crate.

use crate::grpc::dirnode::routing_service_client::RoutingServiceClient;
use crate::grpc::dirnode::store_service_client::StoreServiceClient;
use crate::grpc::dirnode::{ListRequest, RecordBytes, RecordRef as WireRecordRef};
use async_trait::async_trait;
use dirnode_sync::{RemoteConnector, RemoteDirectory};
use std::sync::Arc;
use tonic::transport::Channel;
use tonic::Request;

/// A live connection to one remote node's gRPC endpoint.
pub struct GrpcRemoteDirectory {
    store: StoreServiceClient<Channel>,
    routing: RoutingServiceClient<Channel>,
}

#[async_trait]
impl RemoteDirectory for GrpcRemoteDirectory {
    /// §4.8 step 1: an empty `filter` enumerates the remote's full
    /// locally-published set via `RoutingService.List` with no predicates;
    /// a non-empty `filter` is used directly by the caller instead of
    /// reaching this path (see `SyncEngine::run_pass`), so `filter` here is
    /// accepted for interface parity but unused.
    async fn list_cids(&self, _filter: &[String]) -> Result<Vec<String>, String> {
        let mut routing = self.routing.clone();
        let response = routing
            .list(Request::new(ListRequest { queries: vec![], cid: None, limit: None }))
            .await
            .map_err(|e| e.to_string())?;
        let mut stream = response.into_inner();
        let mut out = Vec::new();
        loop {
            match stream.message().await {
                Ok(Some(item)) => {
                    if let Some(record_ref) = item.record_ref {
                        out.push(record_ref.cid);
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(out)
    }

    async fn pull(&self, cid: &str) -> Result<Vec<u8>, String> {
        let mut store = self.store.clone();
        let request = tokio_stream::once(WireRecordRef { cid: cid.to_string() });
        let response = store.pull(Request::new(request)).await.map_err(|e| e.to_string())?;
        let mut stream = response.into_inner();
        match stream.message().await.map_err(|e| e.to_string())? {
            Some(RecordBytes { data }) => Ok(data),
            None => Err(format!("remote returned no record for {cid}")),
        }
    }
}

/// Dials `remote_url` and builds a [`GrpcRemoteDirectory`] over it.
pub struct GrpcRemoteConnector;

#[async_trait]
impl RemoteConnector for GrpcRemoteConnector {
    async fn connect(&self, remote_url: &str) -> Result<Arc<dyn RemoteDirectory>, String> {
        let channel = Channel::from_shared(remote_url.to_string())
            .map_err(|e| e.to_string())?
            .connect()
            .await
            .map_err(|e| e.to_string())?;
        Ok(Arc::new(GrpcRemoteDirectory {
            store: StoreServiceClient::new(channel.clone()),
            routing: RoutingServiceClient::new(channel),
        }))
    }
}
