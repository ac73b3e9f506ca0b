//! Outbound delivery through the OneBot HTTP API.

use serde::Deserialize;
use tracing::debug;

use cqrelay_core::types::UserId;

use crate::error::ChannelError;

const SEND_PRIVATE_PATH: &str = "/send_private_msg";

pub struct OneBotSender {
    client: reqwest::Client,
    base_url: String,
}

impl OneBotSender {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChannelError> {
        let base_url: String = base_url.into();
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Post `message` to a private chat. A 2xx reply whose body reports
    /// `status: "failed"` or a non-zero `retcode` is an error, except for
    /// `status: "async"` (queued by the implementation).
    pub async fn send_private_msg(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<(), ChannelError> {
        let url = format!("{}{}", self.base_url, SEND_PRIVATE_PATH);
        let body = serde_json::json!({
            "user_id": user_id.get(),
            "message": message,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        // Implementations that answer with an empty or non-JSON body are
        // treated as accepted.
        let Ok(ack) = serde_json::from_str::<SendAck>(&text) else {
            return Ok(());
        };
        ack.into_result(user_id)
    }
}

/// OneBot action response: `{"status":"ok","retcode":0,"data":{"message_id":..}}`.
#[derive(Deserialize)]
struct SendAck {
    #[serde(default)]
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Option<SendAckData>,
    #[serde(default)]
    wording: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct SendAckData {
    message_id: Option<i64>,
}

impl SendAck {
    fn into_result(self, user_id: &UserId) -> Result<(), ChannelError> {
        if self.status == "failed" || (self.retcode != 0 && self.status != "async") {
            return Err(ChannelError::Rejected {
                retcode: self.retcode,
                message: self.wording.or(self.msg).unwrap_or(self.status),
            });
        }
        let message_id = self.data.and_then(|d| d.message_id);
        debug!(user = %user_id, message_id = ?message_id, "private message accepted");
        Ok(())
    }
}
