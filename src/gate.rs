//! Request-level token handling, independent of any HTTP framework.
//!
//! A [`TokenGate`] looks at the method and the two token headers of an
//! incoming request and decides what the surrounding server should do:
//!
//! - no token, nonce present: issue a token and echo both headers back
//! - token and nonce present: accept or reject with 401
//! - neither: pass safe methods through, refuse everything else
//!
//! Tokens travel in headers sealed as standard base64 over a JSON scalar, so
//! the wire form is opaque to clients and tolerant of integer or string
//! payloads.

use std::fmt;
use std::sync::Arc;

use base64::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::codec::Token;
use crate::error::TokenError;
use crate::prf::{Blake3RoundFunction, RoundFunction};
use crate::service::TokenService;
use crate::time::{SystemTimeProvider, TimeProvider};

pub const INITIAL_NONCE_HEADER: &str = "X-Initial-Nonce";
pub const ENCRYPTED_TOKEN_HEADER: &str = "X-Encrypted-Token";

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other,
}

impl Method {
    /// GET and HEAD may pass without a nonce.
    pub fn is_safe(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl From<&str> for Method {
    fn from(verb: &str) -> Self {
        const VERBS: [(&str, Method); 7] = [
            ("GET", Method::Get),
            ("HEAD", Method::Head),
            ("POST", Method::Post),
            ("PUT", Method::Put),
            ("PATCH", Method::Patch),
            ("DELETE", Method::Delete),
            ("OPTIONS", Method::Options),
        ];
        VERBS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(verb))
            .map_or(Method::Other, |(_, method)| *method)
    }
}

/// The parts of a request the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: Method,
    pub nonce: Option<&'a str>,
    pub token: Option<&'a str>,
}

type Predicate = dyn Fn(&GateRequest<'_>) -> bool + Send + Sync;

/// Decides whether the gate runs for a given request at all.
#[derive(Clone, Default)]
pub enum HandlePolicy {
    #[default]
    Always,
    Never,
    When(Arc<Predicate>),
}

impl HandlePolicy {
    pub fn when<P>(predicate: P) -> Self
    where
        P: Fn(&GateRequest<'_>) -> bool + Send + Sync + 'static,
    {
        HandlePolicy::When(Arc::new(predicate))
    }

    fn applies(&self, request: &GateRequest<'_>) -> bool {
        match self {
            HandlePolicy::Always => true,
            HandlePolicy::Never => false,
            HandlePolicy::When(predicate) => predicate(request),
        }
    }
}

impl fmt::Debug for HandlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlePolicy::Always => f.write_str("Always"),
            HandlePolicy::Never => f.write_str("Never"),
            HandlePolicy::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Header values to write on a response that carries a fresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedHeaders {
    pub token: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The gate did not apply; let the request through untouched.
    Skipped,
    Issued(IssuedHeaders),
    Accepted,
    Rejected,
}

impl GateOutcome {
    pub fn status(&self) -> u16 {
        match self {
            GateOutcome::Rejected => STATUS_UNAUTHORIZED,
            _ => STATUS_OK,
        }
    }

    pub fn response_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            GateOutcome::Issued(issued) => vec![
                (ENCRYPTED_TOKEN_HEADER, issued.token.clone()),
                (INITIAL_NONCE_HEADER, issued.nonce.clone()),
            ],
            _ => Vec::new(),
        }
    }
}

/// JSON body for a rejected request.
pub fn unauthorized_body() -> Value {
    json!({ "errors": "Bad token" })
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// An unsafe request arrived with neither token nor nonce.
    #[error("nonce required for {0:?} requests")]
    MissingNonce(Method),
    #[error("bad token envelope: {0}")]
    Envelope(String),
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Wrap a token for transport in a header.
pub fn seal(token: Token) -> String {
    BASE64_STANDARD.encode(Value::from(token.get()).to_string())
}

/// Undo [`seal`]. The result is untrusted and goes through validation as-is.
pub fn unseal(sealed: &str) -> Result<Value, GateError> {
    let bytes = BASE64_STANDARD
        .decode(sealed)
        .map_err(|e| GateError::Envelope(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| GateError::Envelope(e.to_string()))
}

pub struct TokenGate<T = SystemTimeProvider, F = Blake3RoundFunction>
where
    T: TimeProvider,
    F: RoundFunction,
{
    service: Arc<TokenService<T, F>>,
    policy: HandlePolicy,
}

impl<T, F> TokenGate<T, F>
where
    T: TimeProvider,
    F: RoundFunction,
{
    pub fn new(service: Arc<TokenService<T, F>>) -> Self {
        Self::with_policy(service, HandlePolicy::Always)
    }

    pub fn with_policy(service: Arc<TokenService<T, F>>, policy: HandlePolicy) -> Self {
        Self { service, policy }
    }

    pub fn service(&self) -> &TokenService<T, F> {
        &self.service
    }

    pub fn handle(&self, request: &GateRequest<'_>) -> Result<GateOutcome, GateError> {
        if !self.policy.applies(request) {
            return Ok(GateOutcome::Skipped);
        }

        match (request.token, request.nonce) {
            (None, None) if request.method.is_safe() => Ok(GateOutcome::Skipped),
            (None, None) => {
                warn!(method = ?request.method, "unsafe request without nonce");
                Err(GateError::MissingNonce(request.method))
            }
            (None, Some(nonce)) => {
                let token = self.service.generate(nonce)?;
                Ok(GateOutcome::Issued(IssuedHeaders {
                    token: seal(token),
                    nonce: nonce.to_owned(),
                }))
            }
            (Some(_), None) => {
                debug!("token presented without nonce");
                Ok(GateOutcome::Rejected)
            }
            (Some(sealed), Some(nonce)) => {
                let accepted = match unseal(sealed) {
                    Ok(value) => self.service.validate_value(nonce, &value),
                    Err(err) => {
                        debug!(error = %err, "rejected token envelope");
                        false
                    }
                };
                Ok(if accepted {
                    GateOutcome::Accepted
                } else {
                    GateOutcome::Rejected
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use crate::types::TokenConfigBuilder;
    use std::time::Duration;

    const T0: u64 = 1_220_263_500;

    fn gate_at(clock: &Arc<ManualClock>, policy: HandlePolicy) -> TokenGate<ManualClock> {
        let config = TokenConfigBuilder::default()
            .secret("some random string of secret")
            .build_validated()
            .unwrap();
        let service = TokenService::with_time_provider(config, clock.clone()).unwrap();
        TokenGate::with_policy(Arc::new(service), policy)
    }

    fn request<'a>(method: &str, nonce: Option<&'a str>, token: Option<&'a str>) -> GateRequest<'a> {
        GateRequest {
            method: Method::from(method),
            nonce,
            token,
        }
    }

    #[test]
    fn parses_methods_case_insensitively() {
        assert_eq!(Method::from("get"), Method::Get);
        assert_eq!(Method::from("HEAD"), Method::Head);
        assert_eq!(Method::from("Post"), Method::Post);
        assert_eq!(Method::from("BREW"), Method::Other);
        assert!(Method::Head.is_safe());
        assert!(!Method::Delete.is_safe());
    }

    #[test]
    fn issues_then_accepts_echoed_headers() {
        let clock = Arc::new(ManualClock::at_secs(T0));
        let gate = gate_at(&clock, HandlePolicy::Always);

        let issued = gate.handle(&request("GET", Some("nonce1"), None)).unwrap();
        let headers = issued.response_headers();
        assert_eq!(issued.status(), STATUS_OK);
        assert_eq!(headers[1], (INITIAL_NONCE_HEADER, "nonce1".to_string()));
        let GateOutcome::Issued(IssuedHeaders { token, .. }) = issued else {
            panic!("expected issued outcome");
        };

        clock.advance(Duration::from_secs(10));
        let outcome = gate
            .handle(&request("POST", Some("nonce1"), Some(&token)))
            .unwrap();
        assert_eq!(outcome, GateOutcome::Accepted);

        let foreign = gate
            .handle(&request("POST", Some("nonce2"), Some(&token)))
            .unwrap();
        assert_eq!(foreign, GateOutcome::Rejected);

        clock.advance(Duration::from_secs(3600));
        let stale = gate
            .handle(&request("POST", Some("nonce1"), Some(&token)))
            .unwrap();
        assert_eq!(stale.status(), STATUS_UNAUTHORIZED);
    }

    #[test]
    fn safe_requests_without_headers_pass() {
        let clock = Arc::new(ManualClock::at_secs(T0));
        let gate = gate_at(&clock, HandlePolicy::Always);
        assert_eq!(
            gate.handle(&request("GET", None, None)).unwrap(),
            GateOutcome::Skipped
        );
        assert!(matches!(
            gate.handle(&request("POST", None, None)),
            Err(GateError::MissingNonce(Method::Post))
        ));
    }

    #[test]
    fn token_without_nonce_is_rejected() {
        let clock = Arc::new(ManualClock::at_secs(T0));
        let gate = gate_at(&clock, HandlePolicy::Always);
        let sealed = seal(Token::from_raw(12345));
        assert_eq!(
            gate.handle(&request("GET", None, Some(&sealed))).unwrap(),
            GateOutcome::Rejected
        );
    }

    #[test]
    fn garbage_envelopes_are_rejected() {
        let clock = Arc::new(ManualClock::at_secs(T0));
        let gate = gate_at(&clock, HandlePolicy::Always);
        let object = BASE64_STANDARD.encode(r#"{"a":"b"}"#);
        let array = BASE64_STANDARD.encode("[1,3]");
        let huge = BASE64_STANDARD.encode("19238471239487129128347123894712");
        for sealed in ["", "not base64!", "AAAA", object.as_str(), array.as_str(), huge.as_str()] {
            assert_eq!(
                gate.handle(&request("POST", Some("nonce1"), Some(sealed)))
                    .unwrap(),
                GateOutcome::Rejected,
                "envelope {sealed:?}"
            );
        }
    }

    #[test]
    fn policy_can_skip_requests() {
        let clock = Arc::new(ManualClock::at_secs(T0));
        let never = gate_at(&clock, HandlePolicy::Never);
        assert_eq!(
            never.handle(&request("POST", None, None)).unwrap(),
            GateOutcome::Skipped
        );

        let only_unsafe = gate_at(&clock, HandlePolicy::when(|req| !req.method.is_safe()));
        assert_eq!(
            only_unsafe
                .handle(&request("GET", Some("nonce1"), None))
                .unwrap(),
            GateOutcome::Skipped
        );
        assert!(matches!(
            only_unsafe.handle(&request("PUT", Some("nonce1"), None)),
            Ok(GateOutcome::Issued(_))
        ));
    }

    #[test]
    fn envelope_round_trips_and_accepts_strings() {
        let token = Token::from_raw(4_000_000_000);
        assert_eq!(unseal(&seal(token)).unwrap(), json!(4_000_000_000u32));
        let string_form = BASE64_STANDARD.encode(r#""4000000000""#);
        assert_eq!(unseal(&string_form).unwrap(), json!("4000000000"));
        assert!(matches!(unseal("%%%"), Err(GateError::Envelope(_))));
    }

    #[test]
    fn issuance_faults_propagate() {
        let clock = Arc::new(ManualClock::at_secs(u64::from(u32::MAX) + 100));
        let gate = gate_at(&clock, HandlePolicy::Always);
        assert!(matches!(
            gate.handle(&request("GET", Some("nonce1"), None)),
            Err(GateError::Token(TokenError::ClockOutOfRange { .. }))
        ));
    }

    #[test]
    fn unauthorized_body_matches_wire_format() {
        assert_eq!(unauthorized_body().to_string(), r#"{"errors":"Bad token"}"#);
    }
}
