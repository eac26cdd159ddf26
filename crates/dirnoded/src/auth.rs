//! Optional authn (§4.10, §6): workload-identity X.509 (mTLS) or
//! short-lived JWT bearer tokens. When disabled the endpoint is open; when
//! enabled every RPC goes through [`AuthInterceptor`]. Authz is a hook
//! point, allow-all by default (§4.10, §9).

use crate::config::Resolved;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tonic::service::Interceptor;
use tonic::{Code, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Disabled,
    Jwt,
    Mtls,
}

impl AuthMode {
    fn from_config(resolved: &Resolved) -> AuthMode {
        if !resolved.authn_enabled {
            return AuthMode::Disabled;
        }
        match resolved.authn_mode.as_str() {
            "mtls" => AuthMode::Mtls,
            _ => AuthMode::Jwt,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<usize>,
}

/// The identity established for an RPC after a successful authn check,
/// passed through request extensions for [`Authorizer`] to consult.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
}

/// The authz hook point (§4.10 "Authz is a hook point"). The default
/// implementation allows every request once authn (if enabled) has
/// succeeded; a deployment that needs real authorization swaps this for
/// an implementation that consults `identity` and the RPC's method name.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, identity: Option<&Identity>, method: &str) -> bool;
}

pub struct AllowAllAuthorizer;

impl Authorizer for AllowAllAuthorizer {
    fn authorize(&self, _identity: Option<&Identity>, _method: &str) -> bool {
        true
    }
}

/// Validates every incoming RPC per the configured [`AuthMode`] (§4.10
/// "when enabled, every RPC is authenticated").
#[derive(Clone)]
pub struct AuthInterceptor {
    mode: AuthMode,
    jwt_secret: Option<Arc<str>>,
    authorizer: Arc<dyn Authorizer>,
}

impl AuthInterceptor {
    pub fn from_config(resolved: &Resolved, authorizer: Arc<dyn Authorizer>) -> AuthInterceptor {
        AuthInterceptor {
            mode: AuthMode::from_config(resolved),
            jwt_secret: resolved.authn_jwt_secret.clone().map(Arc::from),
            authorizer,
        }
    }

    fn authenticate_jwt(&self, req: &tonic::Request<()>) -> Result<Identity, Status> {
        let Some(secret) = &self.jwt_secret else {
            return Err(Status::new(Code::Unauthenticated, "authn_mode=jwt but no jwt secret configured"));
        };
        let header = req
            .metadata()
            .get("authorization")
            .ok_or_else(|| Status::new(Code::Unauthenticated, "missing authorization header"))?;
        let raw = header.to_str().map_err(|_| Status::new(Code::Unauthenticated, "non-ASCII authorization header"))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| Status::new(Code::Unauthenticated, "authorization header is not a bearer token"))?;

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map_err(|e| Status::new(Code::Unauthenticated, format!("invalid JWT: {e}")))?
            .claims;

        Ok(Identity { subject: claims.sub.unwrap_or_else(|| "unknown".to_string()) })
    }

    /// mTLS identity is already established by the TLS handshake (the
    /// connection would not exist otherwise, since the server's
    /// `client_ca_root` rejects unverified peers before any RPC is
    /// dispatched); this just surfaces a stable `Identity` so the authz
    /// hook has something to look at.
    fn authenticate_mtls(&self, _req: &tonic::Request<()>) -> Result<Identity, Status> {
        Ok(Identity { subject: "mtls-peer".to_string() })
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut req: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        let identity = match self.mode {
            AuthMode::Disabled => None,
            AuthMode::Jwt => Some(self.authenticate_jwt(&req)?),
            AuthMode::Mtls => Some(self.authenticate_mtls(&req)?),
        };

        if !self.authorizer.authorize(identity.as_ref(), "") {
            return Err(Status::new(Code::PermissionDenied, "denied by authorization policy"));
        }

        if let Some(identity) = identity {
            req.extensions_mut().insert(identity);
        }
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn resolved_with(authn_enabled: bool, mode: &str, secret: Option<&str>) -> Resolved {
        Resolved {
            listen_address: "0.0.0.0:8888".parse().unwrap(),
            health_check_address: None,
            routing_listen_address: "/ip4/0.0.0.0/tcp/8999".into(),
            routing_bootstrap_peers: vec![],
            routing_key_path: None,
            routing_datastore_dir: None,
            routing_refresh_interval_secs: None,
            routing_gossipsub_enabled: true,
            database_db_type: "sqlite".into(),
            database_sqlite_path: None,
            authn_enabled,
            authn_mode: mode.into(),
            authz_enabled: false,
            authz_socket_path: None,
            authn_jwt_secret: secret.map(String::from),
            tls_cert_path: None,
            tls_key_path: None,
            tls_client_ca_path: None,
            sign_fulcio_url: String::new(),
            sign_rekor_url: String::new(),
            sign_tsa_url: String::new(),
            log_format: "pretty".into(),
        }
    }

    #[test]
    fn test_disabled_mode_passes_through_without_identity() {
        let resolved = resolved_with(false, "jwt", None);
        let mut interceptor = AuthInterceptor::from_config(&resolved, Arc::new(AllowAllAuthorizer));
        let req = tonic::Request::new(());
        let out = interceptor.call(req).unwrap();
        assert!(out.extensions().get::<Identity>().is_none());
    }

    #[test]
    fn test_jwt_mode_rejects_missing_header() {
        let resolved = resolved_with(true, "jwt", Some("secret"));
        let mut interceptor = AuthInterceptor::from_config(&resolved, Arc::new(AllowAllAuthorizer));
        let req = tonic::Request::new(());
        let err = interceptor.call(req).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[test]
    fn test_jwt_mode_accepts_valid_bearer_token() {
        let resolved = resolved_with(true, "jwt", Some("secret"));
        let mut interceptor = AuthInterceptor::from_config(&resolved, Arc::new(AllowAllAuthorizer));

        let claims = Claims { sub: Some("node-a".into()), exp: Some(9_999_999_999) };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        let mut req = tonic::Request::new(());
        req.metadata_mut().insert("authorization", format!("Bearer {token}").parse().unwrap());

        let out = interceptor.call(req).unwrap();
        assert_eq!(out.extensions().get::<Identity>().unwrap().subject, "node-a");
    }

    #[test]
    fn test_jwt_mode_rejects_wrong_secret() {
        let resolved = resolved_with(true, "jwt", Some("secret"));
        let mut interceptor = AuthInterceptor::from_config(&resolved, Arc::new(AllowAllAuthorizer));

        let claims = Claims { sub: Some("node-a".into()), exp: Some(9_999_999_999) };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"other")).unwrap();

        let mut req = tonic::Request::new(());
        req.metadata_mut().insert("authorization", format!("Bearer {token}").parse().unwrap());

        let err = interceptor.call(req).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }
}
