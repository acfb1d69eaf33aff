//! UM1 one-pass unified-model key agreement.
//!
//! The initiator mixes an ephemeral-static shared secret with a
//! static-static one, giving forward secrecy with a single message. The
//! responder reproduces the secret from the stored ephemeral public key.
//!
//! Curve notes:
//! - secp256r1 has cofactor 1, so ECDH-with-cofactor is plain ECDH.
//! - The Curve25519 family degenerates to plain X25519; no cofactor
//!   clearing is re-applied.

use p256::ecdh as p256_ecdh;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::{CurveName, EcPrivateKey, EcPublicKey};
use crate::registry::EntropySource;
use crate::types::{PackageError, Result};

/// Generate a keypair on the named curve.
pub fn generate_keypair(
    curve: CurveName,
    entropy: &mut EntropySource,
) -> Result<(EcPrivateKey, EcPublicKey)> {
    match curve {
        CurveName::Curve25519 => {
            let secret = match entropy {
                EntropySource::Os => x25519_dalek::StaticSecret::random_from_rng(&mut OsRng),
                EntropySource::Seeded(rng) => x25519_dalek::StaticSecret::random_from_rng(&mut *rng),
            };
            let public = x25519_dalek::PublicKey::from(&secret);
            Ok((
                EcPrivateKey {
                    curve: curve as u16,
                    scalar: secret.to_bytes().to_vec(),
                },
                EcPublicKey {
                    curve: curve as u16,
                    encoded: public.as_bytes().to_vec(),
                },
            ))
        }
        CurveName::Secp256r1 => {
            let secret = match entropy {
                EntropySource::Os => p256::SecretKey::random(&mut OsRng),
                EntropySource::Seeded(rng) => p256::SecretKey::random(&mut *rng),
            };
            let public = secret.public_key();
            Ok((
                EcPrivateKey {
                    curve: curve as u16,
                    scalar: secret.to_bytes().to_vec(),
                },
                EcPublicKey {
                    curve: curve as u16,
                    encoded: public.to_encoded_point(false).as_bytes().to_vec(),
                },
            ))
        }
    }
}

/// Initiator side: returns `(shared_secret, ephemeral_public_key)`.
///
/// The shared secret is `Ze || Zs`, each half encoded to the curve's full
/// field byte length.
pub fn um1_initiate(
    recipient_pub: &EcPublicKey,
    sender_priv: &EcPrivateKey,
    entropy: &mut EntropySource,
) -> Result<(Zeroizing<Vec<u8>>, EcPublicKey)> {
    let curve = same_curve(&[recipient_pub.curve, sender_priv.curve])?;
    let (ephemeral_priv, ephemeral_pub) = generate_keypair(curve, entropy)?;

    let ze = ecdh(curve, recipient_pub, &ephemeral_priv)?;
    let zs = ecdh(curve, recipient_pub, sender_priv)?;

    let mut secret = Zeroizing::new(Vec::with_capacity(ze.len() + zs.len()));
    secret.extend_from_slice(&ze);
    secret.extend_from_slice(&zs);
    // ze, zs, ephemeral_priv wipe on drop.
    Ok((secret, ephemeral_pub))
}

/// Responder side: reproduces the initiator's shared secret.
pub fn um1_respond(
    sender_pub: &EcPublicKey,
    recipient_priv: &EcPrivateKey,
    ephemeral_pub: &EcPublicKey,
) -> Result<Zeroizing<Vec<u8>>> {
    let curve = same_curve(&[sender_pub.curve, recipient_priv.curve, ephemeral_pub.curve])?;

    let ze = ecdh(curve, ephemeral_pub, recipient_priv)?;
    let zs = ecdh(curve, sender_pub, recipient_priv)?;

    let mut secret = Zeroizing::new(Vec::with_capacity(ze.len() + zs.len()));
    secret.extend_from_slice(&ze);
    secret.extend_from_slice(&zs);
    Ok(secret)
}

fn same_curve(raw: &[u16]) -> Result<CurveName> {
    let first = CurveName::verify(raw[0])?;
    if raw.iter().any(|&c| c != raw[0]) {
        return Err(PackageError::ConfigInvalid(
            "key agreement requires all keys on one curve".into(),
        ));
    }
    Ok(first)
}

/// Cofactor Diffie-Hellman, encoded to the curve's field byte length.
fn ecdh(
    curve: CurveName,
    public: &EcPublicKey,
    private: &EcPrivateKey,
) -> Result<Zeroizing<Vec<u8>>> {
    match curve {
        CurveName::Curve25519 => {
            let pk_bytes: [u8; 32] = public
                .encoded
                .as_slice()
                .try_into()
                .map_err(|_| PackageError::ConfigInvalid("malformed Curve25519 public key".into()))?;
            let sk_bytes: [u8; 32] = private
                .scalar
                .as_slice()
                .try_into()
                .map_err(|_| PackageError::ConfigInvalid("malformed Curve25519 private key".into()))?;
            let secret = x25519_dalek::StaticSecret::from(sk_bytes);
            let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(pk_bytes));
            Ok(Zeroizing::new(shared.as_bytes().to_vec()))
        }
        CurveName::Secp256r1 => {
            let pk = p256::PublicKey::from_sec1_bytes(&public.encoded)
                .map_err(|_| PackageError::ConfigInvalid("malformed secp256r1 public key".into()))?;
            let sk = p256::SecretKey::from_slice(&private.scalar)
                .map_err(|_| PackageError::ConfigInvalid("malformed secp256r1 private key".into()))?;
            let shared = p256_ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
    }
}
