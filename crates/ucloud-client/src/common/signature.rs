//! Request signature
//!
//! SHA-1 over every `key` + `value` pair in key order, followed by the
//! private key, hex encoded.

use super::Params;
use sha1::{Digest, Sha1};

/// Compute the `Signature` parameter for `params`
pub fn sign(params: &Params, private_key: &str) -> String {
    let mut hasher = Sha1::new();
    for (key, value) in params.iter() {
        if key == "Signature" {
            continue;
        }
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(private_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_manual_digest() {
        let params = Params::new("DescribeVPC").set("Region", "cn-bj2").set("PublicKey", "pub");
        let expected = hex::encode(Sha1::digest(b"ActionDescribeVPCPublicKeypubRegioncn-bj2secret"));
        assert_eq!(sign(&params, "secret"), expected);
    }

    #[test]
    fn test_signature_ignores_existing_signature() {
        let params = Params::new("DescribeVPC").set("PublicKey", "pub");
        let first = sign(&params, "secret");
        let resigned = sign(&params.clone().set("Signature", &first), "secret");
        assert_eq!(first, resigned);
    }
}
