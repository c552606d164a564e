//! Wire messages of the HTTP API and the WebSocket channel.

use serde::{Deserialize, Serialize};
use staker_dashboard::{DashboardView, TxId, TxNotification};
use staker_types::{StakePreset, StakerError, TxRequest};

/// A user action as posted by the browser.
///
/// `{"action":"stake","amount":"0.10"}`, `{"action":"execute"}`,
/// `{"action":"withdraw"}`. A stake without an amount uses the default
/// preset.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Execute,
    Withdraw,
    Stake {
        #[serde(default)]
        amount: Option<String>,
    },
}

impl ActionRequest {
    pub fn into_request(self) -> Result<TxRequest, StakerError> {
        Ok(match self {
            ActionRequest::Execute => TxRequest::Execute,
            ActionRequest::Withdraw => TxRequest::Withdraw,
            ActionRequest::Stake { amount } => {
                let preset = match amount {
                    Some(amount) => amount.parse::<StakePreset>()?,
                    None => StakePreset::default(),
                };
                TxRequest::stake(preset)
            }
        })
    }
}

/// Messages a WebSocket client may send.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Submit { request: ActionRequest },
    Ping,
}

/// Messages pushed to WebSocket clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    View { view: Box<DashboardView> },
    Transaction { notification: TxNotification },
    Submitted { id: TxId },
    Error { message: String },
    Pong,
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"failed to encode message: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staker_types::Wei;

    #[test]
    fn parses_stake_with_amount() {
        let req: ActionRequest = serde_json::from_str(r#"{"action":"stake","amount":"0.01"}"#).unwrap();
        assert_eq!(
            req.into_request().unwrap(),
            TxRequest::Stake {
                value: Wei::from_ether_str("0.01").unwrap()
            }
        );
    }

    #[test]
    fn stake_without_amount_uses_default_preset() {
        let req: ActionRequest = serde_json::from_str(r#"{"action":"stake"}"#).unwrap();
        assert_eq!(req.into_request().unwrap(), TxRequest::stake(StakePreset::Tenth));
    }

    #[test]
    fn unknown_amount_is_rejected() {
        let req: ActionRequest = serde_json::from_str(r#"{"action":"stake","amount":"0.5"}"#).unwrap();
        assert!(matches!(req.into_request(), Err(StakerError::UnknownPreset(_))));
    }

    #[test]
    fn parses_plain_actions() {
        let req: ActionRequest = serde_json::from_str(r#"{"action":"withdraw"}"#).unwrap();
        assert_eq!(req.into_request().unwrap(), TxRequest::Withdraw);
        assert!(serde_json::from_str::<ActionRequest>(r#"{"action":"burn"}"#).is_err());
    }

    #[test]
    fn parses_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"submit","request":{"action":"execute"}}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Submit {
                request: ActionRequest::Execute
            }
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        ));
    }

    #[test]
    fn server_messages_are_tagged() {
        let json: serde_json::Value = serde_json::from_str(&ServerMessage::Pong.to_json()).unwrap();
        assert_eq!(json["type"], "pong");
        let json: serde_json::Value = serde_json::from_str(
            &ServerMessage::Error {
                message: "nope".into(),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(json["message"], "nope");
    }
}
