//! SMS delivery collaborator.
//!
//! The notifier only sees `send(phone, text) -> bool`; ordinary delivery
//! failures must come back as `false`, never as a panic. The HTTP sender
//! targets a Twilio-compatible messages endpoint; the console sender is
//! demo mode.

use std::time::Duration;

use crate::logging::{self, Component};

/// Default bound on one provider call. The generation loop must never
/// hang on a slow provider.
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Sender trait
// ---------------------------------------------------------------------------

/// Outbound SMS seam. `true` means the provider accepted the message for
/// delivery, not that it reached the handset.
pub trait SmsSender: Send + Sync {
    fn send(&self, phone: &str, text: &str) -> bool;
}

// ---------------------------------------------------------------------------
// HTTP provider sender
// ---------------------------------------------------------------------------

/// Sends through a Twilio-style REST endpoint:
/// `POST {api_url}/Accounts/{sid}/Messages.json` with form fields
/// To/From/Body and basic auth.
pub struct HttpSmsSender {
    client: reqwest::blocking::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl HttpSmsSender {
    pub fn new(
        api_url: &str,
        account_sid: &str,
        auth_token: &str,
        from_number: &str,
        timeout_secs: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpSmsSender {
            client,
            messages_url: messages_url(api_url, account_sid),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
        })
    }
}

/// Provider messages endpoint for an account.
pub fn messages_url(api_url: &str, account_sid: &str) -> String {
    format!(
        "{}/Accounts/{}/Messages.json",
        api_url.trim_end_matches('/'),
        account_sid
    )
}

impl SmsSender for HttpSmsSender {
    fn send(&self, phone: &str, text: &str) -> bool {
        let result = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", phone), ("From", self.from_number.as_str()), ("Body", text)])
            .send();

        match result {
            Ok(response) if response.status().is_success() => {
                logging::debug(Component::Sms, Some(phone), "provider accepted message");
                true
            }
            Ok(response) => {
                let err = std::io::Error::other(format!(
                    "provider returned {}",
                    response.status().as_u16()
                ));
                logging::log_sms_failure(phone, "send", &err);
                false
            }
            Err(e) => {
                logging::log_sms_failure(phone, "send", &e);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Console sender (demo mode)
// ---------------------------------------------------------------------------

/// Prints the message instead of delivering it. Always "accepted".
pub struct ConsoleSender;

impl SmsSender for ConsoleSender {
    fn send(&self, phone: &str, text: &str) -> bool {
        logging::info(
            Component::Sms,
            Some(phone),
            &format!("DEMO SMS:\n{}", text),
        );
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
