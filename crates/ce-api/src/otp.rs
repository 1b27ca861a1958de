//! # Customer OTP Challenges
//!
//! Customers log in with their mobile number and a 6-digit one-time code.
//! Only the SHA-256 digest of the code is held. A challenge expires after
//! the configured TTL and allows [`MAX_ATTEMPTS`] wrong guesses; issuing a
//! new code replaces any pending one for the same number.

use std::sync::Arc;

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use ce_core::{MobileNumber, Timestamp};

use crate::state::Store;

/// Wrong guesses allowed per challenge.
pub const MAX_ATTEMPTS: u32 = 5;

/// Errors from issuing or verifying an OTP.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("no OTP challenge is pending for this number")]
    NoChallenge,
    #[error("OTP challenge has expired")]
    Expired,
    #[error("too many incorrect attempts")]
    TooManyAttempts,
    #[error("incorrect OTP, {remaining} attempts remaining")]
    Mismatch { remaining: u32 },
    #[error("OTP delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a code to a mobile number.
pub trait OtpSender: Send + Sync {
    fn send(&self, mobile: &MobileNumber, code: &str) -> Result<(), OtpError>;
}

/// Sender that records issuance in the service log. The code itself is
/// only emitted at `debug`, for development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
    fn send(&self, mobile: &MobileNumber, code: &str) -> Result<(), OtpError> {
        tracing::info!(mobile = %mobile.masked(), "OTP issued");
        tracing::debug!(mobile = %mobile.masked(), code, "OTP code");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Challenge {
    digest: [u8; 32],
    expires_at: Timestamp,
    attempts_left: u32,
}

/// A freshly issued code.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: Timestamp,
}

/// Pending OTP challenges, keyed by mobile number.
#[derive(Clone)]
pub struct OtpChallenges {
    challenges: Store<MobileNumber, Challenge>,
    ttl_secs: u64,
    sender: Arc<dyn OtpSender>,
}

impl OtpChallenges {
    pub fn new(ttl_secs: u64, sender: Arc<dyn OtpSender>) -> Self {
        Self {
            challenges: Store::new(),
            ttl_secs,
            sender,
        }
    }

    /// Generate, store and deliver a new code for `mobile`.
    pub fn issue(&self, mobile: &MobileNumber) -> Result<IssuedOtp, OtpError> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let expires_at = Timestamp::now().plus_secs(self.ttl_secs);
        self.sender.send(mobile, &code)?;
        self.challenges.insert(
            mobile.clone(),
            Challenge {
                digest: digest(&code),
                expires_at,
                attempts_left: MAX_ATTEMPTS,
            },
        );
        Ok(IssuedOtp { code, expires_at })
    }

    /// Check `code` against the pending challenge. A match consumes the
    /// challenge; so does expiry or running out of attempts. The check and
    /// the removal happen under one lock, so a code is accepted once.
    pub fn verify(&self, mobile: &MobileNumber, code: &str) -> Result<(), OtpError> {
        let candidate = digest(code.trim());
        let now = Timestamp::now();
        self.challenges
            .update_or_remove(mobile, |challenge| {
                let outcome = check(challenge, &candidate, now);
                let consumed = !matches!(outcome, Err(OtpError::Mismatch { .. }));
                (outcome, consumed)
            })
            .unwrap_or(Err(OtpError::NoChallenge))
    }

    /// Drop expired challenges.
    pub fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        self.challenges.retain(|c| now < c.expires_at)
    }

    pub fn pending(&self) -> usize {
        self.challenges.len()
    }
}

fn check(challenge: &mut Challenge, candidate: &[u8; 32], now: Timestamp) -> Result<(), OtpError> {
    if now >= challenge.expires_at {
        return Err(OtpError::Expired);
    }
    if challenge.digest == *candidate {
        return Ok(());
    }
    challenge.attempts_left = challenge.attempts_left.saturating_sub(1);
    if challenge.attempts_left == 0 {
        Err(OtpError::TooManyAttempts)
    } else {
        Err(OtpError::Mismatch {
            remaining: challenge.attempts_left,
        })
    }
}

fn digest(code: &str) -> [u8; 32] {
    Sha256::digest(code.as_bytes()).into()
}
