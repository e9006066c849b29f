//! Key exchange group implementations using RustCrypto.

use p256::ecdh::EphemeralSecret as P256EphemeralSecret;
use p256::PublicKey as P256PublicKey;
use p384::ecdh::EphemeralSecret as P384EphemeralSecret;
use p384::PublicKey as P384PublicKey;
use rand::rngs::OsRng;

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// One ephemeral ECDH key pair.
enum EcdhKeyExchange {
    P256 {
        secret: P256EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
    X25519 {
        secret: x25519_dalek::EphemeralSecret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyExchange")
            .field("group", &self.group())
            .field("public_key_len", &self.pub_key().len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyExchange {
    fn new(group: NamedGroup) -> Result<Self, String> {
        match group {
            NamedGroup::Secp256r1 => {
                let secret = P256EphemeralSecret::random(&mut OsRng);
                let public_key = Buf::from_slice(&P256PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P256 { secret, public_key })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                let public_key = Buf::from_slice(&P384PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P384 { secret, public_key })
            }
            NamedGroup::X25519 => {
                let secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
                let public = x25519_dalek::PublicKey::from(&secret);
                let public_key = Buf::from_slice(public.as_bytes());
                Ok(EcdhKeyExchange::X25519 { secret, public_key })
            }
            _ => Err(format!("unsupported group: {:?}", group)),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
            EcdhKeyExchange::X25519 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "invalid P-256 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "invalid P-384 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "invalid X25519 public key".to_string())?;
                let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err("X25519 shared secret is all zero".to_string());
                }
                out.extend_from_slice(shared.as_bytes());
            }
        }
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
            EcdhKeyExchange::X25519 { .. } => NamedGroup::X25519,
        }
    }
}

#[derive(Debug)]
struct KxGroup(NamedGroup);

impl SupportedKxGroup for KxGroup {
    fn name(&self) -> NamedGroup {
        self.0
    }

    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(self.0)?))
    }
}

static KX_GROUP_X25519: KxGroup = KxGroup(NamedGroup::X25519);
static KX_GROUP_P256: KxGroup = KxGroup(NamedGroup::Secp256r1);
static KX_GROUP_P384: KxGroup = KxGroup(NamedGroup::Secp384r1);

/// Supported groups in preference order.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];
