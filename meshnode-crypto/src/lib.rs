use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PRIVATE_KEY_LEN: usize = 64;
const PUBLIC_KEY_LEN: usize = 32;
const SEED_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;
const ADDRESS_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("seed must be {SEED_LEN} bytes, got {0}")]
    BadSeedLength(usize),
    #[error("public key must be {PUBLIC_KEY_LEN} bytes, got {0}")]
    BadPublicKeyLength(usize),
    #[error("signature must be {SIGNATURE_LEN} bytes, got {0}")]
    BadSignatureLength(usize),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("malformed ed25519 key material")]
    Malformed,
}

/// Owns the 32-byte Ed25519 seed expanded into a 64-byte keypair (seed || public key).
/// Never serialized; peers only ever see the derived [`PublicKey`].
#[derive(Clone)]
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; SEED_LEN] = seed
            .try_into()
            .map_err(|_| CryptoError::BadSeedLength(seed.len()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s)?;
        Self::from_seed(&bytes)
    }

    /// seed || public key, 64 bytes total.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        let mut out = [0u8; PRIVATE_KEY_LEN];
        out[..SEED_LEN].copy_from_slice(&self.signing_key.to_bytes());
        out[SEED_LEN..].copy_from_slice(self.signing_key.verifying_key().as_bytes());
        out
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(msg).to_bytes(),
        }
    }

    pub fn public(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "public_key_bytes")]
    verifying_key: VerifyingKey,
}

mod public_key_bytes {
    use ed25519_dalek::VerifyingKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, s: S) -> Result<S::Ok, S::Error> {
        key.as_bytes().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VerifyingKey, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        VerifyingKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::BadPublicKeyLength(bytes.len()))?;
        Ok(Self {
            verifying_key: VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::Malformed)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    /// Last 20 bytes of the public key, raw, no checksum.
    pub fn address(&self) -> Address {
        let pk = self.verifying_key.to_bytes();
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&pk[PUBLIC_KEY_LEN - ADDRESS_LEN..]);
        Address(addr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::BadPublicKeyLength(b.len()))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "signature_bytes")]
    bytes: [u8; SIGNATURE_LEN],
}

mod signature_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("expected 64 bytes, got {}", v.len())))
    }
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::BadSignatureLength(bytes.len()))?;
        Ok(Self { bytes: arr })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.bytes
    }

    pub fn verify(&self, pubkey: &PublicKey, msg: &[u8]) -> bool {
        let sig = ed25519_dalek::Signature::from_bytes(&self.bytes);
        pubkey.verifying_key.verify(msg, &sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_seed_address() {
        let seed = "10b2718850eb224208fff9f437aa2f07a634e121447ae09eb2d4e90f8bba24dc";
        let priv_key = PrivateKey::from_hex(seed).unwrap();
        assert_eq!(priv_key.public().to_bytes().len(), PUBLIC_KEY_LEN);
        assert_eq!(priv_key.public().address().0.len(), ADDRESS_LEN);
        assert_eq!(
            priv_key.public().address().to_hex(),
            "d5ff8f76dadd9143be31cad6896184e66289c59b"
        );
    }

    #[test]
    fn sign_and_verify() {
        let priv_key = PrivateKey::generate();
        let pub_key = priv_key.public();
        let msg = b"foo bar baz";
        let sig = priv_key.sign(msg);
        assert!(sig.verify(&pub_key, msg));
        assert!(!sig.verify(&pub_key, b"foo"));

        let other = PrivateKey::generate();
        assert!(!sig.verify(&other.public(), msg));
    }

    #[test]
    fn from_seed_rejects_bad_length() {
        assert!(PrivateKey::from_seed(&[0u8; 10]).is_err());
    }
}
