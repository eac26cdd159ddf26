//! `SyncService` (§4.8, §6): translates wire requests into
//! [`dirnode_sync::SyncEngine`] calls. `CreateSync`/`GetSync`/`DeleteSync`
//! are unary; `ListSyncs` streams the current rows.

use super::dirnode::{
    CreateSyncRequest, CreateSyncResponse, DeleteSyncRequest, Empty, GetSyncRequest, GetSyncResponse,
    ListSyncsItem, ListSyncsRequest,
};
use super::dirnode::sync_service_server::SyncService;
use super::{RpcStream, STREAM_CHANNEL_DEPTH};
use crate::error::sync_status;
use dirnode_sync::{SyncEngine, SyncObject, SyncState};
use std::sync::Arc;
use tonic::{Code, Request, Response, Status};
use uuid::Uuid;

pub struct SyncServiceImpl {
    pub engine: Arc<SyncEngine>,
}

fn state_name(state: SyncState) -> &'static str {
    match state {
        SyncState::Pending => "PENDING",
        SyncState::InProgress => "IN_PROGRESS",
        SyncState::DeletePending => "DELETE_PENDING",
        SyncState::Deleted => "DELETED",
        SyncState::Failed => "FAILED",
    }
}

fn parse_sync_id(s: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(s).map_err(|e| Status::new(Code::InvalidArgument, format!("malformed sync_id {s:?}: {e}")))
}

fn to_get_response(sync: SyncObject) -> GetSyncResponse {
    GetSyncResponse {
        sync_id: sync.sync_id.to_string(),
        remote_url: sync.remote_url,
        state: state_name(sync.state).to_string(),
        created_at: sync.created_at.to_rfc3339(),
        updated_at: sync.updated_at.to_rfc3339(),
        error: sync.error,
    }
}

#[tonic::async_trait]
impl SyncService for SyncServiceImpl {
    type ListSyncsStream = RpcStream<ListSyncsItem>;

    async fn create_sync(&self, request: Request<CreateSyncRequest>) -> Result<Response<CreateSyncResponse>, Status> {
        let req = request.into_inner();
        let sync_id = self.engine.create_sync(req.remote_url, req.cids).map_err(sync_status)?;
        Ok(Response::new(CreateSyncResponse { sync_id: sync_id.to_string() }))
    }

    async fn list_syncs(&self, _request: Request<ListSyncsRequest>) -> Result<Response<Self::ListSyncsStream>, Status> {
        let syncs = self.engine.list_syncs().map_err(sync_status)?;
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            for sync in syncs {
                let item = ListSyncsItem {
                    sync_id: sync.sync_id.to_string(),
                    remote_url: sync.remote_url,
                    state: state_name(sync.state).to_string(),
                    updated_at: sync.updated_at.to_rfc3339(),
                };
                if tx.send(Ok(item)).await.is_err() {
                    break;
                }
            }
        });
        Ok(Response::new(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))))
    }

    async fn get_sync(&self, request: Request<GetSyncRequest>) -> Result<Response<GetSyncResponse>, Status> {
        let sync_id = parse_sync_id(&request.into_inner().sync_id)?;
        let sync = self.engine.get_sync(sync_id).map_err(sync_status)?;
        Ok(Response::new(to_get_response(sync)))
    }

    async fn delete_sync(&self, request: Request<DeleteSyncRequest>) -> Result<Response<Empty>, Status> {
        let sync_id = parse_sync_id(&request.into_inner().sync_id)?;
        self.engine.delete_sync(sync_id).map_err(sync_status)?;
        Ok(Response::new(Empty {}))
    }
}
