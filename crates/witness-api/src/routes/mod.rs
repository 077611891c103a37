// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::str::FromStr;

use alloy::primitives::Address;

use crate::handler::ApiError;

pub mod alignments;
pub mod stats;
pub mod witness;

/// Parse a hex wallet address from a request.
pub(crate) fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::from_str(raw.trim()).map_err(|_| ApiError::InvalidAddress(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        let expected = Address::repeat_byte(0xab);
        assert_eq!(parse_address("0xabababababababababababababababababababab").unwrap(), expected);
        assert_eq!(parse_address(" abababababababababababababababababababab ").unwrap(), expected);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_address("0x1234"), Err(ApiError::InvalidAddress(_))));
        assert!(parse_address("not-an-address").is_err());
    }
}
