//! `SearchService` (§4.3, §6): translates wire queries into
//! [`dirnode_search::Query`]/[`dirnode_search::Page`] and streams back
//! matching CIDs.

use super::dirnode::search_service_server::SearchService;
use super::dirnode::{SearchFieldType, SearchRequest, SearchResponse};
use super::{RpcStream, STREAM_CHANNEL_DEPTH};
use crate::error::search_status;
use dirnode_search::{Field, Page, Query, SearchIndex};
use std::sync::Arc;
use tonic::{Code, Request, Response, Status};

pub struct SearchServiceImpl {
    pub index: Arc<SearchIndex>,
}

fn field_of(t: i32) -> Result<Field, Status> {
    match SearchFieldType::try_from(t).unwrap_or(SearchFieldType::SearchFieldTypeUnspecified) {
        SearchFieldType::Name => Ok(Field::Name),
        SearchFieldType::Version => Ok(Field::Version),
        SearchFieldType::SkillId => Ok(Field::SkillId),
        SearchFieldType::SkillName => Ok(Field::SkillName),
        SearchFieldType::Locator => Ok(Field::Locator),
        SearchFieldType::Module => Ok(Field::Module),
        SearchFieldType::SearchFieldTypeUnspecified => {
            Err(Status::new(Code::InvalidArgument, "search field type unspecified"))
        }
    }
}

#[tonic::async_trait]
impl SearchService for SearchServiceImpl {
    type SearchStream = RpcStream<SearchResponse>;

    async fn search(&self, request: Request<SearchRequest>) -> Result<Response<Self::SearchStream>, Status> {
        let req = request.into_inner();
        let queries: Vec<Query> = req
            .queries
            .iter()
            .map(|q| Ok(Query { field: field_of(q.field)?, value: q.value.clone() }))
            .collect::<Result<_, Status>>()?;

        let page = Page {
            limit: req.limit.map(|l| l as usize).unwrap_or_else(|| Page::default().limit),
            offset: req.offset.map(|o| o as usize).unwrap_or(0),
        };

        let cids = self.index.search(&queries, page).map_err(search_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_DEPTH);
        tokio::spawn(async move {
            for cid in cids {
                if tx.send(Ok(SearchResponse { record_cid: cid })).await.is_err() {
                    break;
                }
            }
        });
        Ok(Response::new(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx))))
    }
}
