//! Maps every internal crate's error type onto the gRPC status families
//! of §7 ("Error Handling Design"). This is the only place that knows
//! about `tonic::Status`; the rest of the workspace stays transport-
//! agnostic.

use tonic::{Code, Status};

/// Translate a [`dirnode_core::Error`] (§4.1 "Failure semantics").
pub fn codec_status(err: dirnode_core::Error) -> Status {
    match err {
        dirnode_core::Error::Invalid(_) | dirnode_core::Error::MissingField(_) => {
            Status::new(Code::InvalidArgument, err.to_string())
        }
        dirnode_core::Error::UnsupportedVersion(_) => Status::new(Code::InvalidArgument, err.to_string()),
        dirnode_core::Error::Json(_) => Status::new(Code::InvalidArgument, err.to_string()),
    }
}

/// Translate a [`dirnode_store::StoreError`] (§4.2, §7).
pub fn store_status(err: dirnode_store::StoreError) -> Status {
    use dirnode_store::StoreError::*;
    match err {
        NotFound(_) | ParentNotFound(_) => Status::new(Code::NotFound, err.to_string()),
        TooLarge { .. } => Status::new(Code::InvalidArgument, err.to_string()),
        Codec(e) => codec_status(e),
        Sled(_) | Serialization(_) | Oci(_) => Status::new(Code::Internal, err.to_string()),
    }
}

/// Translate a [`dirnode_routing::RoutingError`] (§4.4-§4.7, §7).
pub fn routing_status(err: dirnode_routing::RoutingError) -> Status {
    use dirnode_routing::RoutingError::*;
    match err {
        EmptyQueries | BadQueryType(_) => Status::new(Code::InvalidArgument, err.to_string()),
        RefNotFound(_) => Status::new(Code::NotFound, err.to_string()),
        Store(e) => store_status(e),
        Codec(e) => codec_status(e),
        Timeout(_) => Status::new(Code::DeadlineExceeded, err.to_string()),
        Overlay(_) => Status::new(Code::Unavailable, err.to_string()),
        Sled(_) | Serialization(_) => Status::new(Code::Internal, err.to_string()),
    }
}

/// Translate a [`dirnode_search::SearchError`] (§4.3, §7).
pub fn search_status(err: dirnode_search::SearchError) -> Status {
    use dirnode_search::SearchError::*;
    match err {
        BadQuery(_) => Status::new(Code::InvalidArgument, err.to_string()),
        Codec(e) => codec_status(e),
        Sqlite(_) => Status::new(Code::Internal, err.to_string()),
    }
}

/// Translate a [`dirnode_sync::SyncError`] (§4.8, §7).
pub fn sync_status(err: dirnode_sync::SyncError) -> Status {
    use dirnode_sync::SyncError::*;
    match err {
        NotFound(_) => Status::new(Code::NotFound, err.to_string()),
        IntegrityMismatch { .. } => Status::new(Code::FailedPrecondition, err.to_string()),
        Timeout(_) => Status::new(Code::DeadlineExceeded, err.to_string()),
        Remote(_) => Status::new(Code::Unavailable, err.to_string()),
        Codec(e) => codec_status(e),
        Store(e) => store_status(e),
        Search(e) => search_status(e),
        Routing(e) => routing_status(e),
        Sled(_) | Serialization(_) => Status::new(Code::Internal, err.to_string()),
    }
}

/// Translate a [`dirnode_sign::SignError`] (§4.9, §7).
pub fn sign_status(err: dirnode_sign::SignError) -> Status {
    use dirnode_sign::SignError::*;
    match err {
        InvalidKey(_) => Status::new(Code::InvalidArgument, err.to_string()),
        RecordNotFound(_) => Status::new(Code::NotFound, err.to_string()),
        OidcUnavailable(_) => Status::new(Code::Unavailable, err.to_string()),
        Timeout(_) => Status::new(Code::DeadlineExceeded, err.to_string()),
        Store(e) => store_status(e),
        Codec(e) => codec_status(e),
        Json(_) => Status::new(Code::Internal, err.to_string()),
    }
}

/// An invalid CID string arriving over the wire (§7 "malformed CID").
pub fn bad_cid(raw: &str, err: dirnode_core::cid::CidParseError) -> Status {
    Status::new(Code::InvalidArgument, format!("malformed CID {raw:?}: {err}"))
}
