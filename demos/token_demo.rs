//! End-to-end walk through the token flow with a frozen clock.
//!
//! - Client sends a nonce, gate issues a sealed token.
//! - Client replays nonce + token: accepted inside the window, rejected after it.
//! - A forged nonce with a stolen token is rejected.
//!
//! Run with `RUST_LOG=encrypted_token=debug` to see rejection reasons.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use encrypted_token::gate::GateOutcome;
use encrypted_token::{
    generate_nonce, Credentials, GateRequest, ManualClock, Method, TokenConfig, TokenGate,
    TokenService,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = TokenConfig::from_json(
        r#"{"secret": "demo secret, do not ship", "time_divisor_secs": 5, "valid_interval_secs": 60}"#,
    )?;
    let clock = Arc::new(ManualClock::at_secs(1_700_000_000));
    let gate = TokenGate::new(Arc::new(TokenService::with_time_provider(
        config,
        clock.clone(),
    )?));

    let nonce = generate_nonce();
    let issued = gate.handle(&GateRequest {
        method: Method::Get,
        nonce: Some(&nonce),
        token: None,
    })?;
    let headers = issued.response_headers();
    let creds = Credentials::from_headers(headers.iter().map(|(k, v)| (*k, v.as_str())))
        .ok_or("server did not issue credentials")?;
    println!("issued token {} for nonce {}", creds.token, creds.nonce);

    for wait in [1, 30, 60] {
        clock.advance(Duration::from_secs(wait));
        let outcome = gate.handle(&GateRequest {
            method: Method::Post,
            nonce: Some(&creds.nonce),
            token: Some(&creds.token),
        })?;
        println!("after +{wait}s: {outcome:?} ({})", outcome.status());
    }

    clock.rewind(Duration::from_secs(60));
    let forged = gate.handle(&GateRequest {
        method: Method::Post,
        nonce: Some("attacker-nonce"),
        token: Some(&creds.token),
    })?;
    assert_eq!(forged, GateOutcome::Rejected);
    println!("forged nonce: {forged:?}");

    Ok(())
}
