//! Package reader.
//!
//! Mirror of the writer: header tag verified, manifest scheme selected
//! from the plaintext header, pre-key resolved (symmetric key or UM1
//! response), key confirmation checked before any KDF work, manifest
//! decrypted and authenticated with its configuration bound in, then the
//! payload demultiplexed with every item MAC verified.
//!
//! Trust model is single-shot: the first failure aborts the whole read,
//! and the caller must discard anything already written to its sinks.

use std::collections::HashMap;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{
    self, EcPrivateKey, EcPublicKey, ItemView, Manifest, ManifestView, SymmetricManifestConfig,
    Um1ManifestConfig,
};
use crate::constants::{
    MAGIC_HEADER, MAGIC_TRAILER, MAX_MANIFEST_HEADER_LEN, MAX_MANIFEST_LEN, SCHEME_SYMMETRIC,
    SCHEME_UM1,
};
use crate::crypto::{confirmation, um1_respond};
use crate::package::io::read_magic;
use crate::payload::{read_payload, ItemPreKeys, PayloadLayout};
use crate::registry::PrimitiveRegistry;
use crate::stream::{CipherReader, MacReader};
use crate::types::{AuthScope, PackageError, Result};
use crate::utils::{equal_ct, read_length_prefixed, u32_le};

enum ReaderScheme {
    Symmetric {
        key: Zeroizing<Vec<u8>>,
    },
    Um1 {
        recipient_priv: EcPrivateKey,
        sender_pub: EcPublicKey,
    },
}

pub struct PackageReader {
    registry: PrimitiveRegistry,
    scheme: ReaderScheme,
    pre_keys: ItemPreKeys,
    manifest: Option<Manifest>,
}

impl PackageReader {
    /// Reader for the symmetric-only manifest scheme.
    pub fn new_symmetric(key: &[u8]) -> Self {
        Self::with_scheme(ReaderScheme::Symmetric {
            key: Zeroizing::new(key.to_vec()),
        })
    }

    /// Reader for the UM1 hybrid scheme: the recipient's private key plus
    /// the expected sender's public key.
    pub fn new_um1(recipient_priv: EcPrivateKey, sender_pub: EcPublicKey) -> Self {
        Self::with_scheme(ReaderScheme::Um1 {
            recipient_priv,
            sender_pub,
        })
    }

    fn with_scheme(scheme: ReaderScheme) -> Self {
        PackageReader {
            registry: PrimitiveRegistry::new(),
            scheme,
            pre_keys: HashMap::new(),
            manifest: None,
        }
    }

    /// Register a pre-key for an item that derives its working keys
    /// through its KDF config.
    pub fn set_item_pre_key(&mut self, identifier: [u8; 16], pre_key: &[u8]) {
        self.pre_keys
            .insert(identifier, Zeroizing::new(pre_key.to_vec()));
    }

    /// Verify the header tag, decrypt and authenticate the manifest, and
    /// leave the stream positioned at the payload body.
    pub fn read_manifest<R: Read>(&mut self, input: &mut R) -> Result<ManifestView> {
        read_magic(input, &MAGIC_HEADER, "header tag")?;
        let header_bytes = read_length_prefixed(input, MAX_MANIFEST_HEADER_LEN)?;
        let header = config::decode_manifest_header(&header_bytes)?;

        // Resolve the scheme config and the pre-key.
        let (symmetric_cfg, pre_key) = match header.scheme_name.as_str() {
            SCHEME_SYMMETRIC => {
                let cfg: SymmetricManifestConfig = config::from_bytes(&header.scheme_config)?;
                let key = match &self.scheme {
                    ReaderScheme::Symmetric { key } => Zeroizing::new(key.to_vec()),
                    ReaderScheme::Um1 { .. } => {
                        return Err(PackageError::ConfigInvalid(
                            "package uses the symmetric scheme; construct the reader with its key"
                                .into(),
                        ))
                    }
                };
                (cfg, key)
            }
            SCHEME_UM1 => {
                let cfg: Um1ManifestConfig = config::from_bytes(&header.scheme_config)?;
                cfg.verify()?;
                let shared = match &self.scheme {
                    ReaderScheme::Um1 {
                        recipient_priv,
                        sender_pub,
                    } => um1_respond(sender_pub, recipient_priv, &cfg.ephemeral_key)?,
                    ReaderScheme::Symmetric { .. } => {
                        return Err(PackageError::ConfigInvalid(
                            "package uses the UM1 scheme; construct the reader with keypairs"
                                .into(),
                        ))
                    }
                };
                (cfg.symmetric, shared)
            }
            other => {
                return Err(PackageError::ConfigInvalid(format!(
                    "unknown manifest scheme {:?}",
                    other
                )))
            }
        };
        symmetric_cfg.verify()?;
        debug!("package read: scheme {}", header.scheme_name);

        // Wrong-key fast-fail, before any KDF work.
        if let Some(kc) = &symmetric_cfg.key_confirmation {
            if !confirmation::verify(kc, &symmetric_cfg.key_confirmation_output, &pre_key)? {
                return Err(PackageError::CiphertextAuthentication(AuthScope::Manifest));
            }
        }

        let (cipher_key, mac_key) = self.registry.derive_working_keys(
            &pre_key,
            symmetric_cfg.cipher_cfg.key_len as usize,
            symmetric_cfg.auth_cfg.key_len as usize,
            &symmetric_cfg.kdf_cfg,
        )?;

        // Manifest ciphertext through MAC-then-decrypt decorators.
        let ct_len = input
            .read_u32::<LittleEndian>()
            .map_err(|_| PackageError::FormatInvalid("truncated manifest length".into()))?;
        if ct_len as usize > MAX_MANIFEST_LEN {
            return Err(PackageError::FormatInvalid(
                "manifest length exceeds cap".into(),
            ));
        }

        let mac_engine = self.registry.create_mac(&symmetric_cfg.auth_cfg, &mac_key)?;
        let cipher_engine =
            self.registry
                .create_cipher(false, &symmetric_cfg.cipher_cfg, &cipher_key)?;
        let limited = input.take(ct_len as u64);
        let mac_reader = MacReader::new(limited, mac_engine);
        let mut cipher_reader = CipherReader::new(mac_reader, cipher_engine)?;

        let mut manifest_bytes = Vec::new();
        cipher_reader.read_to_end(&mut manifest_bytes)?;
        let mut mac_reader = cipher_reader.into_inner();
        if MacReader::bytes(&mac_reader) != ct_len as u64 {
            manifest_bytes.zeroize();
            return Err(PackageError::FormatInvalid(
                "declared manifest length exceeds remaining stream".into(),
            ));
        }

        // Bind ciphertext length and configuration, then verify the tag
        // before trusting a single manifest byte.
        mac_reader.update(&u32_le(ct_len));
        mac_reader.update(&config::to_bytes(&symmetric_cfg.cipher_cfg)?);
        mac_reader.update(&config::to_bytes(&symmetric_cfg.auth_cfg)?);
        mac_reader.update(&config::to_bytes(&symmetric_cfg.kdf_cfg)?);
        let (_, computed_tag) = mac_reader.finish();
        if !equal_ct(&computed_tag, &symmetric_cfg.auth_tag) {
            manifest_bytes.zeroize();
            return Err(PackageError::CiphertextAuthentication(AuthScope::Manifest));
        }

        let manifest: Manifest = config::from_bytes(&manifest_bytes)?;
        manifest_bytes.zeroize();
        manifest.verify()?;
        debug!("package read: manifest holds {} items", manifest.items.len());

        let view = ManifestView {
            layout: manifest.payload_config.layout.clone(),
            items: manifest.items.iter().map(ItemView::from).collect(),
        };
        self.manifest = Some(manifest);
        Ok(view)
    }

    /// Demultiplex the payload into sinks produced by `sink_factory`, then
    /// verify the trailer tag. Requires `read_manifest` first, on the same
    /// stream.
    pub fn extract_to<R, F>(&mut self, input: &mut R, mut sink_factory: F) -> Result<()>
    where
        R: Read,
        F: FnMut(&ItemView) -> Result<Box<dyn std::io::Write>>,
    {
        let manifest = self.manifest.take().ok_or_else(|| {
            PackageError::ConfigInvalid("read_manifest must succeed before extraction".into())
        })?;

        let layout = PayloadLayout::from_config(&manifest.payload_config)?;
        let mut prng = self.registry.create_scheduler(&manifest.payload_config)?;

        let mut sinks: Vec<Box<dyn std::io::Write>> = Vec::with_capacity(manifest.items.len());
        for item in &manifest.items {
            sinks.push(sink_factory(&ItemView::from(item))?);
        }

        let totals = read_payload(
            input,
            &manifest.items,
            &mut sinks,
            layout,
            &mut prng,
            &self.registry,
            &self.pre_keys,
        )?;
        for sink in &mut sinks {
            sink.flush()?;
        }

        read_magic(input, &MAGIC_TRAILER, "trailer tag")?;
        debug!(
            "package read: payload {} bytes ({} padding) verified",
            totals.payload_len, totals.padding_len
        );
        // The manifest (and the item keys inside it) wipes on drop here.
        Ok(())
    }
}
