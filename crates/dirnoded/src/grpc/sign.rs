//! `SignService` (§4.9, §6): translates wire requests into
//! [`dirnode_sign::SignProvider`] and drives the C9 controller.

use super::dirnode::sign_service_server::SignService;
use super::dirnode::{SignProviderKind, SignRequest, SignResponse, VerifyRequest, VerifyResponse};
use crate::error::{bad_cid, sign_status};
use dirnode_core::Cid;
use dirnode_sign::{SignController, SignProvider};
use dirnode_store::RecordRef;
use std::sync::Arc;
use tonic::{Code, Request, Response, Status};

pub struct SignServiceImpl {
    pub controller: Arc<SignController>,
}

fn parse_ref(wire: Option<super::dirnode::RecordRef>) -> Result<RecordRef, Status> {
    let wire = wire.ok_or_else(|| Status::new(Code::InvalidArgument, "missing record_ref"))?;
    let cid = Cid::parse(&wire.cid).map_err(|e| bad_cid(&wire.cid, e))?;
    Ok(RecordRef::from(cid))
}

#[tonic::async_trait]
impl SignService for SignServiceImpl {
    async fn sign(&self, request: Request<SignRequest>) -> Result<Response<SignResponse>, Status> {
        let req = request.into_inner();
        let record_ref = parse_ref(req.record_ref)?;

        let provider = match SignProviderKind::try_from(req.provider).unwrap_or(SignProviderKind::SignProviderKindUnspecified) {
            SignProviderKind::Key => {
                let private_key = req
                    .private_key
                    .ok_or_else(|| Status::new(Code::InvalidArgument, "key provider requires private_key"))?;
                SignProvider::Key { private_key, password: req.password }
            }
            SignProviderKind::Oidc => {
                let id_token = req
                    .id_token
                    .ok_or_else(|| Status::new(Code::InvalidArgument, "oidc provider requires id_token"))?;
                SignProvider::Oidc { id_token }
            }
            SignProviderKind::SignProviderKindUnspecified => {
                return Err(Status::new(Code::InvalidArgument, "sign provider unspecified"))
            }
        };

        let signature = self.controller.sign(&record_ref, provider).await.map_err(sign_status)?;
        Ok(Response::new(SignResponse { signature }))
    }

    async fn verify(&self, request: Request<VerifyRequest>) -> Result<Response<VerifyResponse>, Status> {
        let req = request.into_inner();
        let record_ref = parse_ref(req.record_ref)?;
        let result = self.controller.verify(&record_ref).await.map_err(sign_status)?;
        Ok(Response::new(VerifyResponse { success: result.success, error: result.error }))
    }
}
