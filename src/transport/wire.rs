//! Wire envelope for patch messages
//!
//! Patch messages share their channel with unrelated traffic, so the envelope
//! carries a discriminator tag as its first field: recipients can filter on
//! the tag without understanding the rest. Encoding is MessagePack with named
//! fields, which keeps the payload binary-safe and lets receivers ignore
//! fields they do not know.

use crate::constants::PATCH_MESSAGE_TYPE;
use crate::core::error::SerializationError;
use crate::types::ModuleDelta;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The wire envelope around one module delta.
///
/// Self-contained: no session or sequence identifier. Ordering is guaranteed
/// by the channel being a single ordered stream, not by the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchMessage {
    /// Discriminator tag; always [`PATCH_MESSAGE_TYPE`] for patch messages
    #[serde(rename = "type")]
    pub message_type: String,

    /// Name of the target module
    #[serde(rename = "modulePath")]
    pub module_path: String,

    /// Metadata bytes
    #[serde(rename = "metaBytes")]
    pub meta: Bytes,

    /// Instruction bytes
    #[serde(rename = "ilBytes")]
    pub il: Bytes,

    /// Debug-info bytes
    #[serde(rename = "pdbBytes")]
    pub pdb: Bytes,
}

impl PatchMessage {
    /// Wrap a delta in its wire envelope
    pub fn from_delta(delta: &ModuleDelta) -> Self {
        Self {
            message_type: PATCH_MESSAGE_TYPE.to_string(),
            module_path: delta.module_name.clone(),
            meta: delta.meta.clone(),
            il: delta.il.clone(),
            pdb: delta.pdb.clone(),
        }
    }

    /// True when the discriminator identifies this as a code patch
    pub fn is_patch(&self) -> bool {
        self.message_type == PATCH_MESSAGE_TYPE
    }

    /// Unwrap the envelope back into a delta
    pub fn into_delta(self) -> ModuleDelta {
        ModuleDelta {
            module_name: self.module_path,
            meta: self.meta,
            il: self.il,
            pdb: self.pdb,
        }
    }
}

/// Serialize a delta into one wire frame
pub fn encode(delta: &ModuleDelta) -> Result<Vec<u8>, SerializationError> {
    Ok(rmp_serde::to_vec_named(&PatchMessage::from_delta(delta))?)
}

/// Deserialize a wire frame.
///
/// Callers treat a decode failure as "unrelated traffic", not as an error
/// condition worth escalating.
pub fn decode(frame: &[u8]) -> Result<PatchMessage, SerializationError> {
    Ok(rmp_serde::from_slice(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_delta() -> ModuleDelta {
        ModuleDelta::new("app.bin", vec![1, 2, 3], vec![4, 5], vec![6])
    }

    #[test]
    fn test_encode_decode_preserves_delta() {
        let delta = sample_delta();
        let frame = encode(&delta).unwrap();
        let message = decode(&frame).unwrap();

        assert!(message.is_patch());
        assert_eq!(message.module_path, "app.bin");
        assert_eq!(message.into_delta(), delta);
    }

    #[test]
    fn test_discriminator_precedes_module_path_on_wire() {
        let frame = encode(&sample_delta()).unwrap();

        let position_of = |needle: &[u8]| {
            frame
                .windows(needle.len())
                .position(|window| window == needle)
                .unwrap()
        };
        assert!(position_of(b"type") < position_of(b"modulePath"));
    }

    #[test]
    fn test_decode_rejects_malformed_frame() {
        assert!(decode(&[0xFF, 0x00, 0x13, 0x37]).is_err());
        assert!(decode(b"plain text on the shared channel").is_err());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        #[derive(Serialize)]
        struct FutureMessage<'a> {
            #[serde(rename = "type")]
            message_type: &'a str,
            #[serde(rename = "modulePath")]
            module_path: &'a str,
            #[serde(rename = "metaBytes")]
            meta: Bytes,
            #[serde(rename = "ilBytes")]
            il: Bytes,
            #[serde(rename = "pdbBytes")]
            pdb: Bytes,
            #[serde(rename = "sessionId")]
            session_id: u64,
        }

        let frame = rmp_serde::to_vec_named(&FutureMessage {
            message_type: PATCH_MESSAGE_TYPE,
            module_path: "app.bin",
            meta: Bytes::from_static(&[1]),
            il: Bytes::from_static(&[2]),
            pdb: Bytes::from_static(&[3]),
            session_id: 42,
        })
        .unwrap();

        let message = decode(&frame).unwrap();
        assert!(message.is_patch());
        assert_eq!(message.module_path, "app.bin");
    }

    #[test]
    fn test_decode_accepts_foreign_tag_for_caller_side_filtering() {
        let mut foreign = PatchMessage::from_delta(&sample_delta());
        foreign.message_type = "Heartbeat".to_string();

        let frame = rmp_serde::to_vec_named(&foreign).unwrap();
        let message = decode(&frame).unwrap();
        assert!(!message.is_patch());
    }
}
