//! `StoreService` (§4.2, §6): thin translation between the wire messages
//! and [`dirnode_store::BlobStore`]. The store itself holds no label
//! semantics (§4.2) — that stays C7's job, via `RoutingService`. `push`
//! and `delete` additionally keep C3 (the search index) in step, since an
//! object with no search-index row, or a stale one left behind after
//! deletion, is a correctness bug rather than a layering nicety.

use super::dirnode::store_service_server::StoreService;
use super::dirnode::{
    DeleteResponse, PullReferrerRequest, PullReferrerResponse, PushReferrerRequest, PushReferrerResponse,
    RecordBytes, RecordMeta, RecordRef, Referrer as WireReferrer,
};
use super::{spawn_stream_pipeline, RpcStream, STREAM_CHANNEL_DEPTH};
use crate::error::{bad_cid, store_status};
use dirnode_core::Cid;
use dirnode_search::SearchIndex;
use dirnode_store::{BlobStore, Referrer};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

pub struct StoreServiceImpl {
    pub store: Arc<BlobStore>,
    pub search: Arc<SearchIndex>,
}

fn parse_cid(s: &str) -> Result<Cid, Status> {
    Cid::parse(s).map_err(|e| bad_cid(s, e))
}

fn to_record_ref(cid: &Cid) -> RecordRef {
    RecordRef { cid: cid.to_string() }
}

#[tonic::async_trait]
impl StoreService for StoreServiceImpl {
    type PushStream = RpcStream<RecordRef>;
    type PullStream = RpcStream<RecordBytes>;
    type LookupStream = RpcStream<RecordMeta>;
    type DeleteStream = RpcStream<DeleteResponse>;
    type PushReferrerStream = RpcStream<PushReferrerResponse>;
    type PullReferrerStream = RpcStream<PullReferrerResponse>;

    async fn push(&self, request: Request<tonic::Streaming<RecordBytes>>) -> Result<Response<Self::PushStream>, Status> {
        let store = self.store.clone();
        let search = self.search.clone();
        let stream = spawn_stream_pipeline(request.into_inner(), move |item: RecordBytes| {
            let store = store.clone();
            let search = search.clone();
            async move {
                let record_ref = store.put(&item.data).await.map_err(store_status)?;
                let record = store.get_record(&record_ref).await.map_err(store_status)?;
                search
                    .index_record(&record_ref.cid, &record.normalize(), &chrono::Utc::now().to_rfc3339())
                    .map_err(crate::error::search_status)?;
                Ok(to_record_ref(&record_ref.cid))
            }
        });
        Ok(Response::new(stream))
    }

    async fn pull(&self, request: Request<tonic::Streaming<RecordRef>>) -> Result<Response<Self::PullStream>, Status> {
        let store = self.store.clone();
        let stream = spawn_stream_pipeline(request.into_inner(), move |item: RecordRef| {
            let store = store.clone();
            async move {
                let cid = parse_cid(&item.cid)?;
                let bytes = store.get(&cid.into()).await.map_err(store_status)?;
                Ok(RecordBytes { data: bytes })
            }
        });
        Ok(Response::new(stream))
    }

    async fn lookup(&self, request: Request<tonic::Streaming<RecordRef>>) -> Result<Response<Self::LookupStream>, Status> {
        let store = self.store.clone();
        let stream = spawn_stream_pipeline(request.into_inner(), move |item: RecordRef| {
            let store = store.clone();
            async move {
                let cid = parse_cid(&item.cid)?;
                let meta = store.head(&cid.into()).await.map_err(store_status)?;
                Ok(RecordMeta {
                    cid: meta.cid.to_string(),
                    size: meta.size as u64,
                    created_at: meta.created_at.to_rfc3339(),
                    referrer_types: meta.referrer_types,
                })
            }
        });
        Ok(Response::new(stream))
    }

    async fn delete(&self, request: Request<tonic::Streaming<RecordRef>>) -> Result<Response<Self::DeleteStream>, Status> {
        let store = self.store.clone();
        let search = self.search.clone();
        let stream = spawn_stream_pipeline(request.into_inner(), move |item: RecordRef| {
            let store = store.clone();
            let search = search.clone();
            async move {
                let cid = parse_cid(&item.cid)?;
                store.delete(&cid.into()).await.map_err(store_status)?;
                let _ = search.remove_record(&cid);
                Ok(DeleteResponse { cid: item.cid, ok: true })
            }
        });
        Ok(Response::new(stream))
    }

    async fn push_referrer(
        &self,
        request: Request<tonic::Streaming<PushReferrerRequest>>,
    ) -> Result<Response<Self::PushReferrerStream>, Status> {
        let store = self.store.clone();
        let stream = spawn_stream_pipeline(request.into_inner(), move |item: PushReferrerRequest| {
            let store = store.clone();
            async move {
                let record_ref = item.record_ref.ok_or_else(|| Status::invalid_argument("missing record_ref"))?;
                let cid = parse_cid(&record_ref.cid)?;
                let wire = item.referrer.ok_or_else(|| Status::invalid_argument("missing referrer"))?;
                store
                    .push_referrer(&cid.into(), Referrer { type_: wire.r#type, data: wire.data, media_type: wire.media_type })
                    .await
                    .map_err(store_status)?;
                Ok(PushReferrerResponse { ok: true })
            }
        });
        Ok(Response::new(stream))
    }

    async fn pull_referrer(
        &self,
        request: Request<tonic::Streaming<PullReferrerRequest>>,
    ) -> Result<Response<Self::PullReferrerStream>, Status> {
        let store = self.store.clone();
        let mut inbound = request.into_inner();
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);

        tokio::spawn(async move {
            while let Some(item) = inbound.next().await {
                let Ok(item) = item else { continue };
                let Some(record_ref) = item.record_ref else {
                    if tx.send(Err(Status::invalid_argument("missing record_ref"))).await.is_err() {
                        break;
                    }
                    continue;
                };
                let cid = match parse_cid(&record_ref.cid) {
                    Ok(cid) => cid,
                    Err(status) => {
                        if tx.send(Err(status)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                let referrers = store.pull_referrer(&cid.into(), item.type_filter.as_deref()).await;
                match referrers {
                    Ok(referrers) => {
                        for referrer in referrers {
                            let response = PullReferrerResponse {
                                referrer: Some(WireReferrer {
                                    r#type: referrer.type_,
                                    data: referrer.data,
                                    media_type: referrer.media_type,
                                }),
                            };
                            if tx.send(Ok(response)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        if tx.send(Err(store_status(e))).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))))
    }
}
