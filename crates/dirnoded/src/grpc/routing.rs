//! `RoutingService` (§4.7, §6): translates wire queries into
//! [`dirnode_routing::RoutingQuery`] and drives the C7 controller.
//! `Publish`/`Unpublish` are unary on the wire even though the controller
//! itself reports per-ref outcomes (§4.7 "partial failures per ref are
//! surfaced per-item") — a batch with any failing ref comes back as a
//! single `Status` naming every failed cid, rather than silently
//! swallowing the rest.

use super::dirnode::routing_service_server::RoutingService;
use super::dirnode::{
    Empty, ListRequest, ListResponse, PublishRequest, RoutingQuery as WireRoutingQuery, RoutingQueryType,
    SearchRoutingRequest, SearchRoutingResponse, UnpublishRequest,
};
use super::{RpcStream, STREAM_CHANNEL_DEPTH};
use crate::error::{bad_cid, routing_status};
use dirnode_core::Cid;
use dirnode_routing::{Facet, RoutingController, RoutingQuery};
use dirnode_store::RecordRef;
use std::sync::Arc;
use tonic::{Code, Request, Response, Status};

pub struct RoutingServiceImpl {
    pub controller: Arc<RoutingController>,
}

fn facet_of(t: i32) -> Result<Facet, Status> {
    match RoutingQueryType::try_from(t).unwrap_or(RoutingQueryType::RoutingQueryTypeUnspecified) {
        RoutingQueryType::Skill => Ok(Facet::Skill),
        RoutingQueryType::Locator => Ok(Facet::Locator),
        RoutingQueryType::Module => Ok(Facet::Module),
        RoutingQueryType::Domain => Ok(Facet::Domain),
        RoutingQueryType::Feature => Ok(Facet::Feature),
        RoutingQueryType::RoutingQueryTypeUnspecified => {
            Err(Status::new(Code::InvalidArgument, "routing query type unspecified"))
        }
    }
}

fn to_queries(wire: &[WireRoutingQuery]) -> Result<Vec<RoutingQuery>, Status> {
    wire.iter().map(|q| Ok(RoutingQuery::new(facet_of(q.r#type)?, q.value.clone()))).collect()
}

fn to_record_refs(cids: &[super::dirnode::RecordRef]) -> Result<Vec<RecordRef>, Status> {
    cids.iter()
        .map(|r| Cid::parse(&r.cid).map(RecordRef::from).map_err(|e| bad_cid(&r.cid, e)))
        .collect()
}

#[tonic::async_trait]
impl RoutingService for RoutingServiceImpl {
    type ListStream = RpcStream<ListResponse>;
    type SearchStream = RpcStream<SearchRoutingResponse>;

    async fn publish(&self, request: Request<PublishRequest>) -> Result<Response<Empty>, Status> {
        let record_refs = to_record_refs(&request.into_inner().record_refs)?;
        let outcomes = self.controller.publish(&record_refs).await;
        let failed: Vec<String> =
            outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| format!("{}: {e}", o.cid))).collect();
        if !failed.is_empty() {
            return Err(Status::new(Code::Internal, format!("publish failed for: {}", failed.join("; "))));
        }
        Ok(Response::new(Empty {}))
    }

    async fn unpublish(&self, request: Request<UnpublishRequest>) -> Result<Response<Empty>, Status> {
        let record_refs = to_record_refs(&request.into_inner().record_refs)?;
        let outcomes = self.controller.unpublish(&record_refs).await;
        let failed: Vec<String> =
            outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| format!("{}: {e}", o.cid))).collect();
        if !failed.is_empty() {
            return Err(Status::new(Code::Internal, format!("unpublish failed for: {}", failed.join("; "))));
        }
        Ok(Response::new(Empty {}))
    }

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<Self::ListStream>, Status> {
        let req = request.into_inner();
        let queries = to_queries(&req.queries)?;
        let limit = req.limit.map(|l| l as usize);
        let entries = self.controller.list(&queries, req.cid.as_deref(), limit).map_err(routing_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            for entry in entries {
                let response = ListResponse {
                    record_ref: Some(super::dirnode::RecordRef { cid: entry.cid }),
                    labels: entry.labels,
                    peer: None,
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });
        Ok(Response::new(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))))
    }

    async fn search(&self, request: Request<SearchRoutingRequest>) -> Result<Response<Self::SearchStream>, Status> {
        let req = request.into_inner();
        let queries = to_queries(&req.queries)?;
        let limit = req.limit.map(|l| l as usize);
        let min_match_score = req.min_match_score.map(|s| s as usize);
        let hits = self.controller.search(&queries, limit, min_match_score).map_err(routing_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            for hit in hits {
                let response = SearchRoutingResponse {
                    record_ref: hit.cid.map(|cid| super::dirnode::RecordRef { cid }),
                    peer: hit.peer,
                    labels: hit.labels,
                    matched_queries: hit.matched_queries,
                    score: hit.score as u32,
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });
        Ok(Response::new(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))))
    }
}
