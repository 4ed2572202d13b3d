//! Turning node-specific revert reports into [`LedgerError::Reverted`].
use ethers_core::abi::{self, ParamType, Token};

use crate::LedgerError;

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decodes an `Error(string)` revert payload.
pub fn decode_revert_data(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    match abi::decode(&[ParamType::String], payload).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Extracts the reason string from the messages hardhat, anvil and geth use
/// for reverted calls.
pub fn parse_revert_message(message: &str) -> Option<Option<String>> {
    const QUOTED: &str = "reverted with reason string '";
    if let Some(start) = message.find(QUOTED) {
        let rest = &message[start + QUOTED.len()..];
        let reason = rest.rfind('\'').map_or(rest, |end| &rest[..end]);
        return Some(Some(reason.to_string()));
    }
    if let Some(start) = message.find("execution reverted") {
        let rest = message[start + "execution reverted".len()..]
            .trim_start_matches(':')
            .trim();
        return Some((!rest.is_empty()).then(|| rest.to_string()));
    }
    if message.contains("reverted without a reason") || message.contains("VM Exception") {
        return Some(None);
    }
    None
}

/// Maps a JSON-RPC error object onto a [`LedgerError`], recognising reverts.
pub fn classify_rpc_error(code: i64, message: String, data: Option<String>) -> LedgerError {
    if let Some(reason) = data
        .as_deref()
        .and_then(|data| hex::decode(data.trim_start_matches("0x")).ok())
        .and_then(|bytes| decode_revert_data(&bytes))
    {
        return LedgerError::Reverted {
            reason: Some(reason),
        };
    }
    match parse_revert_message(&message) {
        Some(reason) => LedgerError::Reverted { reason },
        None => LedgerError::Rpc {
            code,
            message,
            data,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode_revert_reason(reason: &str) -> Vec<u8> {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String(reason.to_string())]));
        data
    }

    #[test]
    fn decodes_error_string_payload() {
        let data = encode_revert_reason("Ownable: caller is not the owner");
        assert_eq!(
            decode_revert_data(&data).as_deref(),
            Some("Ownable: caller is not the owner")
        );
        assert_eq!(decode_revert_data(&data[..3]), None);
    }

    #[test]
    fn parses_hardhat_message() {
        let message = "Error: VM Exception while processing transaction: reverted with reason string 'CONTROL_ONLY'";
        assert_eq!(
            parse_revert_message(message),
            Some(Some("CONTROL_ONLY".to_string()))
        );
    }

    #[test]
    fn parses_anvil_message() {
        assert_eq!(
            parse_revert_message("execution reverted: BENEFICIARY_ONLY"),
            Some(Some("BENEFICIARY_ONLY".to_string()))
        );
        assert_eq!(parse_revert_message("execution reverted"), Some(None));
        assert_eq!(parse_revert_message("nonce too low"), None);
    }

    #[test]
    fn classify_prefers_payload_over_message() {
        let data = format!("0x{}", hex::encode(encode_revert_reason("ALREADY_INITIALIZED")));
        let err = classify_rpc_error(3, "execution reverted".into(), Some(data));
        assert!(matches!(
            err,
            LedgerError::Reverted { reason: Some(ref reason) } if reason == "ALREADY_INITIALIZED"
        ));

        let err = classify_rpc_error(-32000, "insufficient funds for gas".into(), None);
        assert!(matches!(err, LedgerError::Rpc { code: -32000, .. }));
    }
}
