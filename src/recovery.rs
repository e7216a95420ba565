// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Report Recovery
//!
//! Composes gateway retrieval, repair, detection and decryption into the
//! single operation callers use:
//!
//! ```text
//! fetch (rounds) -> detect -> [repair -> detect] -> password? -> decrypt -> merge
//! ```
//!
//! Fetch and repair problems degrade to showing the raw text where that is
//! safe. Decryption problems never degrade: the caller gets the error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::content::{
    detect, repair, sidecar_fields, Detection, EncryptedEnvelope, Fixup, RepairStatus,
};
use crate::crypto::{decrypt, DecryptError, DecryptedContent, Password};
use crate::error::RecoveryError;
use crate::gateway::{FetchError, GatewayEndpoint, GatewayFetcher, RawContent};

/// Longest accepted content address.
pub const MAX_CONTENT_ADDRESS_LEN: usize = 128;

/// Key under which a nested envelope's non-object plaintext is merged.
pub const NESTED_PLAINTEXT_FIELD: &str = "contenido";

/// What a locked report needs before it can be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordPrompt {
    pub algorithm: String,
    pub timestamp: String,
    pub version: String,
    /// True when the envelope was embedded in an outer report.
    pub nested: bool,
    /// Plaintext fields of the outer report, for nested envelopes.
    pub sidecar: Option<Map<String, Value>>,
}

/// Final content of a recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveredContent {
    /// Not JSON, or JSON that could not be repaired.
    PlainText(String),
    PlainJson(Value),
    NeedsPassword(PasswordPrompt),
    /// `content` is the parsed plaintext, the plaintext string, or for nested
    /// envelopes the sidecar fields merged with the plaintext.
    Decrypted { content: Value, parsed_as_json: bool },
}

/// Where the content came from and what was done to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub gateway: String,
    pub latency: Duration,
    pub repaired: bool,
    pub fixups: Vec<Fixup>,
    /// Fetch round (1-based) that succeeded.
    pub rounds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    pub content: RecoveredContent,
    pub provenance: Provenance,
}

/// Reject addresses that could escape `<gateway><hash>`.
pub fn validate_content_address(hash: &str) -> Result<(), RecoveryError> {
    if hash.is_empty() {
        return Err(RecoveryError::InvalidContentAddress("content address is empty"));
    }
    if hash.len() > MAX_CONTENT_ADDRESS_LEN {
        return Err(RecoveryError::InvalidContentAddress(
            "content address is longer than 128 characters",
        ));
    }
    if !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(RecoveryError::InvalidContentAddress(
            "content address must be alphanumeric",
        ));
    }
    Ok(())
}

/// The retrieve-and-resolve pipeline. Cheap to clone.
#[derive(Clone)]
pub struct RecoveryService {
    fetcher: GatewayFetcher,
    config: Arc<RecoveryConfig>,
}

impl RecoveryService {
    pub fn new(fetcher: GatewayFetcher, config: RecoveryConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Health records of the configured gateways, in declaration order.
    pub fn gateway_health(&self) -> Vec<GatewayEndpoint> {
        self.fetcher.health().snapshot(&self.config.gateways)
    }

    /// True when at least one configured gateway is currently healthy.
    pub fn any_gateway_healthy(&self) -> bool {
        self.gateway_health().iter().any(|endpoint| endpoint.healthy)
    }

    /// Fetch and resolve the report stored under `hash`.
    ///
    /// Without a password an encrypted report yields
    /// [`RecoveredContent::NeedsPassword`]; with one it is decrypted.
    pub async fn recover(
        &self,
        hash: &str,
        password: Option<Password>,
        cancel: &CancellationToken,
    ) -> Result<Recovery, RecoveryError> {
        if let Err(e) = validate_content_address(hash) {
            warn!(error = %e, "Rejected content address");
            return Err(e);
        }

        let span = info_span!("recovery", recovery_id = %Uuid::new_v4(), hash = %hash);
        async move {
            let result = self.run(hash, password, cancel).await;
            match &result {
                Ok(recovery) => info!(
                    outcome = outcome_label(&recovery.content),
                    gateway = %recovery.provenance.gateway,
                    rounds = recovery.provenance.rounds,
                    repaired = recovery.provenance.repaired,
                    "Recovery finished"
                ),
                Err(e) => warn!(error_code = e.error_code(), error = %e, "Recovery failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        hash: &str,
        password: Option<Password>,
        cancel: &CancellationToken,
    ) -> Result<Recovery, RecoveryError> {
        let (raw, rounds) = self.fetch_with_retry(hash, cancel).await?;
        let RawContent {
            text,
            gateway,
            latency,
        } = raw;

        let (detection, fixups) = classify(&text);
        let provenance = Provenance {
            gateway,
            latency,
            repaired: !fixups.is_empty(),
            fixups,
            rounds,
        };

        let content = match detection {
            Detection::NotJson => RecoveredContent::PlainText(text),
            Detection::PlainJson(document) => RecoveredContent::PlainJson(document),
            Detection::Envelope(envelope) => match password {
                None => RecoveredContent::NeedsPassword(prompt(&envelope, None)),
                Some(password) => {
                    let decrypted = decrypt_off_thread(envelope, password).await?;
                    direct_content(decrypted)
                }
            },
            Detection::NestedEnvelope { envelope, outer } => {
                let sidecar = sidecar_fields(&outer);
                match password {
                    None => RecoveredContent::NeedsPassword(prompt(&envelope, Some(sidecar))),
                    Some(password) => {
                        let decrypted = decrypt_off_thread(envelope, password).await?;
                        merge_sidecar(sidecar, decrypted)
                    }
                }
            }
        };

        Ok(Recovery {
            content,
            provenance,
        })
    }

    /// Run up to `fetch_rounds` full passes over the gateways.
    async fn fetch_with_retry(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<(RawContent, u32), RecoveryError> {
        let rounds = self.config.fetch_rounds.max(1);
        let mut round = 1;

        loop {
            let outcome = self
                .fetcher
                .fetch(
                    hash,
                    &self.config.gateways,
                    self.config.attempt_timeout,
                    cancel,
                )
                .await;

            match outcome {
                Ok(raw) => return Ok((raw, round)),
                Err(FetchError::FetchFailure(attempts)) if round < rounds => {
                    warn!(
                        round,
                        rounds,
                        failed = attempts.len(),
                        backoff_ms = self.config.retry_backoff.as_millis() as u64,
                        "Fetch round failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RecoveryError::Cancelled),
                        _ = tokio::time::sleep(self.config.retry_backoff) => {}
                    }
                    round += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Detect, repairing once if the text does not parse.
fn classify(text: &str) -> (Detection, Vec<Fixup>) {
    let direct = detect(text);
    if !matches!(direct, Detection::NotJson) {
        return (direct, Vec::new());
    }

    let repaired = repair(text);
    match repaired.status {
        RepairStatus::Repaired => {
            let detection = detect(&repaired.text);
            if matches!(detection, Detection::NotJson) {
                // A repaired document always has an object at its root.
                debug!("Repaired text is not a JSON document, showing raw text");
                return (Detection::NotJson, Vec::new());
            }
            debug!(
                fixups = repaired.fixups.len(),
                detected = detection.kind(),
                "Repaired malformed report"
            );
            (detection, repaired.fixups)
        }
        RepairStatus::Failed(failure) => {
            warn!(error = %failure, "Repair failed, showing raw text");
            (Detection::NotJson, Vec::new())
        }
        // Passthrough is plain text; AlreadyValid here means a bare JSON scalar.
        RepairStatus::Passthrough | RepairStatus::AlreadyValid => (Detection::NotJson, Vec::new()),
    }
}

fn prompt(envelope: &EncryptedEnvelope, sidecar: Option<Map<String, Value>>) -> PasswordPrompt {
    PasswordPrompt {
        algorithm: envelope.algorithm.clone(),
        timestamp: envelope.timestamp.clone(),
        version: envelope.version.clone(),
        nested: sidecar.is_some(),
        sidecar,
    }
}

/// Decryption is CPU-bound (100 000 PBKDF2 rounds), so it leaves the runtime threads.
async fn decrypt_off_thread(
    envelope: EncryptedEnvelope,
    password: Password,
) -> Result<DecryptedContent, RecoveryError> {
    let joined = tokio::task::spawn_blocking(move || decrypt(&envelope, &password)).await;
    match joined {
        Ok(result) => result.map_err(|e| {
            if let Some(step) = defect_step(&e) {
                warn!(step, "Envelope rejected before decryption");
            }
            RecoveryError::from(e)
        }),
        Err(join_error) => {
            error!(error = %join_error, "Decryption task did not complete");
            Err(RecoveryError::InternalInvariantViolation(format!(
                "decryption task failed: {join_error}"
            )))
        }
    }
}

fn defect_step(error: &DecryptError) -> Option<&'static str> {
    match error {
        DecryptError::MalformedEnvelope(defect) => Some(defect.step()),
        DecryptError::WrongPasswordOrCorruptData => None,
    }
}

fn direct_content(decrypted: DecryptedContent) -> RecoveredContent {
    let parsed_as_json = decrypted.parsed_as_json();
    let content = decrypted
        .parsed
        .unwrap_or(Value::String(decrypted.plaintext));
    RecoveredContent::Decrypted {
        content,
        parsed_as_json,
    }
}

/// Overlay decrypted fields on the sidecar; decrypted values win.
fn merge_sidecar(sidecar: Map<String, Value>, decrypted: DecryptedContent) -> RecoveredContent {
    let parsed_as_json = decrypted.parsed_as_json();
    let mut merged = sidecar;
    match decrypted.parsed {
        Some(Value::Object(fields)) => merged.extend(fields),
        Some(other) => {
            merged.insert(NESTED_PLAINTEXT_FIELD.to_string(), other);
        }
        None => {
            merged.insert(
                NESTED_PLAINTEXT_FIELD.to_string(),
                Value::String(decrypted.plaintext),
            );
        }
    }
    RecoveredContent::Decrypted {
        content: Value::Object(merged),
        parsed_as_json,
    }
}

fn outcome_label(content: &RecoveredContent) -> &'static str {
    match content {
        RecoveredContent::PlainText(_) => "plain_text",
        RecoveredContent::PlainJson(_) => "plain_json",
        RecoveredContent::NeedsPassword(_) => "needs_password",
        RecoveredContent::Decrypted { .. } => "decrypted",
    }
}
