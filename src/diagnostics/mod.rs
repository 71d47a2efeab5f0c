//! Step-by-step credential diagnostics for operators.
//!
//! Walks the same chain a delegated call uses (lookup, decrypt, plaintext
//! fallback, refresh) and records every step, so "no credential",
//! "bad ciphertext", "revoked token" and "provider unavailable" can be told
//! apart. Read-only: the refreshed access token is discarded and nothing is
//! written back. Secret values only appear as `[redacted: N chars]`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::credentials::{redact, CredentialStore, TokenSource};
use crate::drive::{DriveError, DriveResult};
use crate::token::{RefreshError, TokenClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CredentialLookup,
    Decrypt,
    PlaintextFallback,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    Skipped,
}

/// Overall verdict of a diagnostics run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    NoCredential,
    NoRefreshToken,
    /// The provider refused the refresh token (revoked or expired)
    RefreshRejected,
    /// The provider or network failed; retrying later may work
    RefreshTransient,
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: Step,
    pub status: StepStatus,
    pub detail: String,
}

/// Which refresh token the run ended up using, without its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSummary {
    pub source: TokenSource,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub user_id: String,
    pub encryption_enabled: bool,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<TokenSummary>,
    pub outcome: Outcome,
    pub generated_at: DateTime<Utc>,
}

impl DiagnosticsReport {
    fn new(user_id: &str, encryption_enabled: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            encryption_enabled,
            steps: Vec::with_capacity(4),
            refresh_token: None,
            outcome: Outcome::Ok,
            generated_at: Utc::now(),
        }
    }

    fn record(&mut self, step: Step, status: StepStatus, detail: impl Into<String>) {
        self.steps.push(StepResult {
            step,
            status,
            detail: detail.into(),
        });
    }

    /// Status of a given step, if it was recorded.
    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.status)
    }
}

pub struct DiagnosticsReporter {
    store: Arc<CredentialStore>,
    tokens: TokenClient,
}

impl DiagnosticsReporter {
    pub fn new(store: Arc<CredentialStore>, tokens: TokenClient) -> Self {
        Self { store, tokens }
    }

    pub async fn diagnose(&self, user_id: &str) -> DriveResult<DiagnosticsReport> {
        let mut report = DiagnosticsReport::new(user_id, self.store.encryption_enabled());

        let credential = self
            .store
            .get_credential(user_id)
            .map_err(DriveError::storage)?;

        let Some(credential) = credential else {
            report.record(
                Step::CredentialLookup,
                StepStatus::Failed,
                "No credential stored for this user",
            );
            report.record(Step::Decrypt, StepStatus::Skipped, "No credential");
            report.record(Step::PlaintextFallback, StepStatus::Skipped, "No credential");
            report.record(Step::Refresh, StepStatus::Skipped, "No credential");
            report.outcome = Outcome::NoCredential;
            return Ok(finish(report));
        };

        report.record(
            Step::CredentialLookup,
            StepStatus::Ok,
            format!(
                "Credential found (connected: {}, scope: {}, cached access token: {})",
                credential
                    .connected_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "no (soft disconnected)".to_string()),
                credential.scope.as_deref().unwrap_or("unknown"),
                credential.has_access_token,
            ),
        );

        let mut token: Option<(String, TokenSource)> = None;

        match &credential.encrypted_refresh_token {
            None => report.record(
                Step::Decrypt,
                StepStatus::Skipped,
                "No encrypted refresh token stored",
            ),
            Some(sealed) => match self.store.open_sealed(sealed) {
                Ok(plain) => {
                    report.record(
                        Step::Decrypt,
                        StepStatus::Ok,
                        format!("Decrypted refresh token {}", redact(&plain)),
                    );
                    token = Some((plain, TokenSource::Encrypted));
                }
                Err(e) => report.record(
                    Step::Decrypt,
                    StepStatus::Failed,
                    format!("Decryption failed: {:#}", e),
                ),
            },
        }

        if token.is_some() {
            report.record(
                Step::PlaintextFallback,
                StepStatus::Skipped,
                "Encrypted refresh token in use",
            );
        } else {
            match credential.refresh_token.as_deref().filter(|t| !t.is_empty()) {
                Some(plain) => {
                    report.record(
                        Step::PlaintextFallback,
                        StepStatus::Ok,
                        format!("Plaintext refresh token found {}", redact(plain)),
                    );
                    token = Some((plain.to_string(), TokenSource::Plaintext));
                }
                None => report.record(
                    Step::PlaintextFallback,
                    StepStatus::Failed,
                    "No plaintext refresh token stored",
                ),
            }
        }

        let Some((refresh_token, source)) = token else {
            report.record(
                Step::Refresh,
                StepStatus::Skipped,
                "No refresh token available",
            );
            report.outcome = Outcome::NoRefreshToken;
            return Ok(finish(report));
        };

        report.refresh_token = Some(TokenSummary {
            source,
            value: redact(&refresh_token),
        });

        match self.tokens.refresh(&refresh_token).await {
            Ok(access) => {
                report.record(
                    Step::Refresh,
                    StepStatus::Ok,
                    format!(
                        "Access token issued {}{}",
                        redact(&access.token),
                        access
                            .expires_in_seconds
                            .map(|s| format!(", expires in {}s", s))
                            .unwrap_or_default()
                    ),
                );
                report.outcome = Outcome::Ok;
            }
            Err(e) => {
                report.outcome = classify_refresh_error(&e);
                report.record(Step::Refresh, StepStatus::Failed, e.to_string());
            }
        }

        Ok(finish(report))
    }
}

fn classify_refresh_error(error: &RefreshError) -> Outcome {
    match error {
        RefreshError::Rejected { .. } => Outcome::RefreshRejected,
        e if e.is_transient() => Outcome::RefreshTransient,
        _ => Outcome::RefreshFailed,
    }
}

fn finish(report: DiagnosticsReport) -> DiagnosticsReport {
    info!(
        user_id = %report.user_id,
        outcome = ?report.outcome,
        "Credential diagnostics completed"
    );
    report
}
