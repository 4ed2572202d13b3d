//! ABI helpers shared by the typed contract handles.
use ethers_core::{
    abi::{AbiParser, Detokenize, Function, Token},
    utils::to_checksum,
};
use hex::FromHex;

use crate::HarnessError;

/// Parses a human-readable function signature such as
/// `function balanceOf(address) external view returns (uint256)`.
pub fn parse_function(signature: &str) -> Result<Function, HarnessError> {
    Ok(AbiParser::default().parse_function(signature)?)
}

/// ABI-encodes a function call according to the provided signature. The
/// parsed function is returned alongside for decoding the output.
pub fn encode_function_call(
    signature: &str,
    args: &[Token],
) -> Result<(Function, Vec<u8>), HarnessError> {
    let function = parse_function(signature)?;
    let encoded = function.encode_input(args)?;
    Ok((function, encoded))
}

/// Decodes return data into a single Rust value.
pub fn decode_output<R: Detokenize>(function: &Function, data: &[u8]) -> Result<R, HarnessError> {
    let tokens = decode_tokens(function, data)?;
    R::from_tokens(tokens).map_err(|err| HarnessError::Decode {
        function: function.signature(),
        detail: err.to_string(),
    })
}

pub fn decode_tokens(function: &Function, data: &[u8]) -> Result<Vec<Token>, HarnessError> {
    function
        .decode_output(data)
        .map_err(|err| HarnessError::Decode {
            function: function.signature(),
            detail: err.to_string(),
        })
}

/// Parses a hex string (with or without `0x` prefix) into raw bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, HarnessError> {
    let trimmed = hex.trim().strip_prefix("0x").unwrap_or(hex.trim());
    Vec::from_hex(trimmed).map_err(|err| HarnessError::Artifact(format!("invalid hex: {err}")))
}

/// Canonical textual form of a returned value, used for snapshot comparison.
pub fn render_token(token: &Token) -> String {
    match token {
        Token::Uint(value) | Token::Int(value) => value.to_string(),
        Token::Address(address) => to_checksum(address, None),
        Token::Bool(value) => value.to_string(),
        Token::String(value) => value.clone(),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => format!("0x{}", hex::encode(bytes)),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => format!(
            "[{}]",
            items.iter().map(render_token).collect::<Vec<_>>().join(",")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Address, U256};

    #[test]
    fn parses_view_signature_with_outputs() {
        let function =
            parse_function("function balanceOf(address) external view returns (uint256)").unwrap();
        assert_eq!(function.name, "balanceOf");
        assert_eq!(function.outputs.len(), 1);
        assert_eq!(function.short_signature(), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encodes_arguments_after_selector() {
        let holder = Address::repeat_byte(0xaa);
        let (_, data) = encode_function_call(
            "function balanceOf(address) external view returns (uint256)",
            &[Token::Address(holder)],
        )
        .unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&data[16..], holder.as_bytes());
        assert!(encode_function_call(
            "function balanceOf(address) external view returns (uint256)",
            &[Token::Bool(true)],
        )
        .is_err());
    }

    #[test]
    fn decodes_uint_output() {
        let function =
            parse_function("function totalSupply() external view returns (uint256)").unwrap();
        let data = ethers_core::abi::encode(&[Token::Uint(U256::from(42u64))]);
        let value: U256 = decode_output(&function, &data).unwrap();
        assert_eq!(value, U256::from(42u64));
        assert!(decode_output::<U256>(&function, &data[..16]).is_err());
    }

    #[test]
    fn renders_addresses_checksummed() {
        let address: Address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap();
        assert_eq!(
            render_token(&Token::Address(address)),
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        );
        assert_eq!(render_token(&Token::Bool(false)), "false");
    }

    #[test]
    fn hex_to_bytes_accepts_prefix() {
        assert_eq!(hex_to_bytes("0x6080").unwrap(), vec![0x60, 0x80]);
        assert_eq!(hex_to_bytes("6080").unwrap(), vec![0x60, 0x80]);
        assert!(hex_to_bytes("0xzz").is_err());
    }
}
