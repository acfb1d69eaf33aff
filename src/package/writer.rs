//! Package writer.
//!
//! Orchestrates one `write` call end to end: manifest crypto setup,
//! payload multiplexing into temp storage, manifest serialization through
//! the Encrypt-then-MAC stack with configuration binding, then emission
//! of header tag, manifest header, manifest ciphertext, payload body, and
//! trailer tag. Single-shot: the writer is consumed, and every derived
//! key is wiped before the call returns.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{
    self, AuthConfig, CipherConfig, ConfirmationConfig, EcPrivateKey, EcPublicKey, ItemKind,
    KdfConfig, Manifest, ManifestHeader, PayloadItem, SymmetricManifestConfig, Um1ManifestConfig,
};
use crate::constants::{
    cipher_ids, hash_ids, kdf_ids, mac_ids, mode_ids, padding_ids, DEFAULT_PAD_MAX,
    DEFAULT_PAD_MIN, FORMAT_VERSION, MAGIC_HEADER, MAGIC_TRAILER, PRNG_SEED_LEN,
    SCHEME_SYMMETRIC, SCHEME_UM1,
};
use crate::config::FrameshiftParams;
use crate::crypto::{confirmation, um1_initiate};
use crate::package::io::{write_magic, ItemSource, TempSink, TempStorage};
use crate::payload::{write_payload, ItemPreKeys, PayloadLayout, SchedulingPrng};
use crate::registry::{EntropySource, PrimitiveRegistry};
use crate::stream::{CipherWriter, MacWriter};
use crate::types::{PackageError, Result};
use crate::utils::{u32_le, write_length_prefixed};

enum WriterScheme {
    Symmetric {
        key: Zeroizing<Vec<u8>>,
    },
    Um1 {
        sender_priv: EcPrivateKey,
        recipient_pub: EcPublicKey,
    },
}

struct PendingItem {
    item: PayloadItem,
    source: ItemSource,
}

pub struct PackageWriter {
    registry: PrimitiveRegistry,
    entropy: EntropySource,
    scheme: WriterScheme,
    pending: Vec<PendingItem>,
    pre_keys: ItemPreKeys,
    layout: PayloadLayout,
    prng_seed: Option<[u8; 32]>,
    temp: TempStorage,
}

impl PackageWriter {
    /// Writer for the symmetric-only manifest scheme.
    pub fn new_symmetric(key: &[u8]) -> Self {
        Self::with_scheme(WriterScheme::Symmetric {
            key: Zeroizing::new(key.to_vec()),
        })
    }

    /// Writer for the UM1 hybrid scheme: the sender's private key plus the
    /// recipient's public key.
    pub fn new_um1(sender_priv: EcPrivateKey, recipient_pub: EcPublicKey) -> Self {
        Self::with_scheme(WriterScheme::Um1 {
            sender_priv,
            recipient_pub,
        })
    }

    fn with_scheme(scheme: WriterScheme) -> Self {
        PackageWriter {
            registry: PrimitiveRegistry::new(),
            entropy: EntropySource::system(),
            scheme,
            pending: Vec::new(),
            pre_keys: HashMap::new(),
            layout: PayloadLayout::Frameshift(FrameshiftParams {
                pad_min: DEFAULT_PAD_MIN,
                pad_max: DEFAULT_PAD_MAX,
            }),
            prng_seed: None,
            temp: TempStorage::default(),
        }
    }

    /// Replace the entropy source (seeded entropy is for reproducible
    /// tests; production stays on the system source).
    pub fn set_entropy(&mut self, entropy: EntropySource) {
        self.entropy = entropy;
    }

    pub fn set_payload_layout(&mut self, layout: PayloadLayout) {
        self.layout = layout;
    }

    /// Fix the scheduling seed instead of drawing it from entropy.
    pub fn set_payload_prng_seed(&mut self, seed: [u8; PRNG_SEED_LEN]) {
        self.prng_seed = Some(seed);
    }

    pub fn set_temp_storage(&mut self, temp: TempStorage) {
        self.temp = temp;
    }

    /// Register a pre-key for an item that derives its working keys
    /// through its KDF config instead of embedding them.
    pub fn set_item_pre_key(&mut self, identifier: [u8; 16], pre_key: &[u8]) {
        self.pre_keys
            .insert(identifier, Zeroizing::new(pre_key.to_vec()));
    }

    /// Add a UTF-8 text item under the given name.
    pub fn add_text(&mut self, name: &str, text: &str) -> Result<[u8; 16]> {
        let bytes = text.as_bytes().to_vec();
        self.add_bytes_item(name.to_string(), ItemKind::Utf8Text, bytes)
    }

    /// Add a binary item from memory.
    pub fn add_bytes(&mut self, name: &str, bytes: Vec<u8>) -> Result<[u8; 16]> {
        self.add_bytes_item(name.to_string(), ItemKind::Binary, bytes)
    }

    /// Add one file; its name becomes the relative path.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<[u8; 16]> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PackageError::ConfigInvalid("file has no usable name".into()))?
            .to_string();
        let len = std::fs::metadata(path)?.len();
        let item = self.default_item(name, ItemKind::Binary, len)?;
        let id = item.identifier;
        self.pending.push(PendingItem {
            item,
            source: ItemSource::File(path.to_path_buf()),
        });
        Ok(id)
    }

    /// Add every file under `path`, with paths relative to it. Entries are
    /// sorted so the item order is stable across platforms.
    pub fn add_directory<P: AsRef<Path>>(&mut self, path: P, recursive: bool) -> Result<Vec<[u8; 16]>> {
        let root = path.as_ref();
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        collect_files(root, root, recursive, &mut files)?;
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let mut ids = Vec::with_capacity(files.len());
        for (file_path, relative) in files {
            let len = std::fs::metadata(&file_path)?.len();
            let item = self.default_item(relative, ItemKind::Binary, len)?;
            ids.push(item.identifier);
            self.pending.push(PendingItem {
                item,
                source: ItemSource::File(file_path),
            });
        }
        Ok(ids)
    }

    /// Add a fully caller-specified item. The item must embed its keys or
    /// have a pre-key registered for its identifier.
    pub fn add_item(&mut self, item: PayloadItem, source: ItemSource) {
        self.pending.push(PendingItem { item, source });
    }

    fn add_bytes_item(&mut self, name: String, kind: ItemKind, bytes: Vec<u8>) -> Result<[u8; 16]> {
        let item = self.default_item(name, kind, bytes.len() as u64)?;
        let id = item.identifier;
        self.pending.push(PendingItem {
            item,
            source: ItemSource::Memory(bytes),
        });
        Ok(id)
    }

    /// Default per-item crypto: XSalsa20 with a fresh key and nonce,
    /// Poly1305 with a fresh single-use key, both embedded in the
    /// manifest.
    fn default_item(&mut self, relative_path: String, kind: ItemKind, len: u64) -> Result<PayloadItem> {
        let mut identifier = [0u8; 16];
        self.entropy.fill(&mut identifier);
        let item = PayloadItem {
            identifier,
            relative_path,
            kind,
            external_length: len,
            internal_length: 0,
            cipher_cfg: CipherConfig {
                cipher: cipher_ids::XSALSA20,
                mode: mode_ids::NONE,
                padding: padding_ids::NONE,
                key_len: 32,
                iv: self.entropy.bytes(24),
            },
            auth_cfg: AuthConfig {
                mac: mac_ids::POLY1305,
                key_len: 32,
            },
            kdf_cfg: None,
            cipher_key: Some(self.entropy.bytes(32)),
            auth_key: Some(self.entropy.bytes(32)),
            auth_tag: Vec::new(),
        };
        item.verify()?;
        Ok(item)
    }

    /// Manifest crypto defaults: XSalsa20 + HMAC-SHA256 working keys
    /// stretched from the pre-key with scrypt, confirmation on.
    fn manifest_crypto(&mut self) -> (CipherConfig, AuthConfig, KdfConfig, ConfirmationConfig) {
        (
            CipherConfig {
                cipher: cipher_ids::XSALSA20,
                mode: mode_ids::NONE,
                padding: padding_ids::NONE,
                key_len: 32,
                iv: self.entropy.bytes(24),
            },
            AuthConfig {
                mac: mac_ids::HMAC_SHA256,
                key_len: 32,
            },
            KdfConfig {
                kdf: kdf_ids::SCRYPT,
                salt: self.entropy.bytes(16),
                log2_n: 14,
                r: 8,
                p: 1,
                iterations: 0,
            },
            ConfirmationConfig {
                hash: hash_ids::SHA256,
                salt: self.entropy.bytes(16),
            },
        )
    }

    /// Produce the package. Consumes the writer; on error the output is
    /// invalid and must be discarded by the caller.
    pub fn write<W: Write>(mut self, out: &mut W) -> Result<()> {
        if self.pending.is_empty() {
            return Err(PackageError::ConfigInvalid("package has no items".into()));
        }
        debug!("package write: {} items", self.pending.len());

        // Header tag first; a partial write is recognizably incomplete
        // because the trailer is still missing.
        write_magic(out, &MAGIC_HEADER)?;

        // Manifest scheme setup.
        let (cipher_cfg, auth_cfg, kdf_cfg, confirmation_cfg) = self.manifest_crypto();
        let (pre_key, scheme_name, ephemeral_key) = match &mut self.scheme {
            WriterScheme::Symmetric { key } => {
                (Zeroizing::new(key.to_vec()), SCHEME_SYMMETRIC, None)
            }
            WriterScheme::Um1 {
                sender_priv,
                recipient_pub,
            } => {
                let (shared, ephemeral) =
                    um1_initiate(recipient_pub, sender_priv, &mut self.entropy)?;
                (shared, SCHEME_UM1, Some(ephemeral))
            }
        };
        let confirmation_output = confirmation::generate(&confirmation_cfg, &pre_key)?;
        let (cipher_key, mac_key) = self.registry.derive_working_keys(
            &pre_key,
            cipher_cfg.key_len as usize,
            auth_cfg.key_len as usize,
            &kdf_cfg,
        )?;

        // Multiplex the payload into temp storage.
        let mut seed = [0u8; PRNG_SEED_LEN];
        match self.prng_seed {
            Some(s) => seed = s,
            None => self.entropy.fill(&mut seed),
        }
        let payload_config = self.layout.to_config(seed)?;
        let mut prng = SchedulingPrng::from_seed(seed);

        let mut items: Vec<PayloadItem> = Vec::with_capacity(self.pending.len());
        let mut sources: Vec<Box<dyn std::io::Read>> = Vec::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            items.push(pending.item);
            sources.push(pending.source.open()?);
        }

        let mut temp = TempSink::open(&self.temp)?;
        let totals = write_payload(
            &mut temp,
            &mut items,
            &mut sources,
            self.layout,
            &mut prng,
            &self.registry,
            &self.pre_keys,
        )?;
        drop(sources);

        // Manifest through the Encrypt-then-MAC stack, into memory.
        let manifest = Manifest {
            payload_config,
            items,
        };
        let mut manifest_ct = Vec::new();
        let mac_engine = self.registry.create_mac(&auth_cfg, &mac_key)?;
        let cipher_engine = self.registry.create_cipher(true, &cipher_cfg, &cipher_key)?;
        let mac_writer = MacWriter::new(&mut manifest_ct, mac_engine);
        let mut cipher_writer = CipherWriter::new(mac_writer, cipher_engine)?;

        let mut manifest_bytes = config::to_bytes(&manifest)?;
        cipher_writer.write_all(&manifest_bytes)?;
        cipher_writer.finish()?;
        manifest_bytes.zeroize();

        // Bind ciphertext length and configuration into the manifest MAC.
        let mut mac_writer = cipher_writer.into_inner();
        let ct_len = mac_writer.bytes() as u32;
        mac_writer.update(&u32_le(ct_len));
        mac_writer.update(&config::to_bytes(&cipher_cfg)?);
        mac_writer.update(&config::to_bytes(&auth_cfg)?);
        mac_writer.update(&config::to_bytes(&kdf_cfg)?);
        let (_, auth_tag) = mac_writer.finish();

        // Manifest header names the scheme and carries its config.
        let symmetric = SymmetricManifestConfig {
            cipher_cfg,
            auth_cfg,
            kdf_cfg,
            key_confirmation: Some(confirmation_cfg),
            key_confirmation_output: confirmation_output,
            auth_tag,
        };
        let scheme_config = match ephemeral_key {
            None => config::to_bytes(&symmetric)?,
            Some(ephemeral_key) => config::to_bytes(&Um1ManifestConfig {
                symmetric,
                ephemeral_key,
            })?,
        };
        let header = ManifestHeader {
            format_version: FORMAT_VERSION,
            scheme_name: scheme_name.to_string(),
            scheme_config,
        };
        write_length_prefixed(out, &config::encode_manifest_header(&header)?)?;

        // Manifest ciphertext, then the captured payload body.
        out.write_all(&u32_le(ct_len))?;
        out.write_all(&manifest_ct)?;
        let replayed = temp.replay(out)?;
        debug_assert_eq!(replayed, totals.payload_len);

        write_magic(out, &MAGIC_TRAILER)?;
        out.flush()?;
        debug!(
            "package write: manifest {} bytes, payload {} bytes ({} padding)",
            ct_len, totals.payload_len, totals.padding_len
        );
        // Working keys and the manifest's item keys wipe on drop here.
        Ok(())
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    recursive: bool,
    out: &mut Vec<(PathBuf, String)>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let kind = entry.file_type()?;
        if kind.is_dir() {
            if recursive {
                collect_files(root, &path, recursive, out)?;
            }
            continue;
        }
        if !kind.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|_| PackageError::ConfigInvalid("directory walk escaped its root".into()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        out.push((path, relative));
    }
    Ok(())
}
