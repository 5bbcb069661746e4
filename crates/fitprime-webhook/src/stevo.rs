//! Shape validation for Stevo (WhatsApp gateway) webhook bodies.
//!
//! Stevo has delivered messages in three envelope layouts over time:
//! `{"data": {"key": {"remoteJid": ..}}}`, `{"key": {"remoteJid": ..}}` and
//! a flat `{"from": ..}`. Any of them is accepted. When a `remoteJid` is
//! present it must look like a WhatsApp JID (`number@s.whatsapp.net` or
//! `group@g.us`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a payload was rejected; messages are shown to API callers as-is
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Payload inválido")]
    NotAnObject,

    #[error("Estrutura de payload não reconhecida")]
    UnrecognizedStructure,

    #[error("remoteJid inválido")]
    InvalidRemoteJid(String),
}

/// Which envelope layout matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeShape {
    DataKey,
    Key,
    From,
}

/// Addressing information pulled out of an accepted payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StevoEnvelope {
    pub shape: EnvelopeShape,
    pub remote_jid: Option<String>,
    pub from: Option<String>,
}

impl StevoEnvelope {
    /// Best available sender address
    pub fn sender(&self) -> Option<&str> {
        self.remote_jid.as_deref().or(self.from.as_deref())
    }
}

/// Validate the structure of a Stevo webhook body
///
/// # Examples
///
/// ```
/// use fitprime_webhook::stevo::{validate_stevo_payload, EnvelopeShape};
/// use serde_json::json;
///
/// let envelope = validate_stevo_payload(&json!({
///     "key": {"remoteJid": "5511999999999@s.whatsapp.net"}
/// }))
/// .unwrap();
/// assert_eq!(envelope.shape, EnvelopeShape::Key);
///
/// let err = validate_stevo_payload(&json!({"foo": "bar"})).unwrap_err();
/// assert_eq!(err.to_string(), "Estrutura de payload não reconhecida");
/// ```
pub fn validate_stevo_payload(payload: &Value) -> Result<StevoEnvelope, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::NotAnObject);
    }

    let remote = present(payload.pointer("/data/key/remoteJid"))
        .map(|jid| (EnvelopeShape::DataKey, jid))
        .or_else(|| present(payload.pointer("/key/remoteJid")).map(|jid| (EnvelopeShape::Key, jid)));
    let from = present(payload.get("from")).map(value_to_string);

    match remote {
        Some((shape, jid)) => {
            let jid = jid
                .as_str()
                .filter(|jid| jid.contains('@'))
                .ok_or_else(|| PayloadError::InvalidRemoteJid(value_to_string(jid)))?;
            Ok(StevoEnvelope {
                shape,
                remote_jid: Some(jid.to_string()),
                from,
            })
        }
        None if from.is_some() => Ok(StevoEnvelope {
            shape: EnvelopeShape::From,
            remote_jid: None,
            from,
        }),
        None => Err(PayloadError::UnrecognizedStructure),
    }
}

/// Treat null, false and empty strings as absent
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
