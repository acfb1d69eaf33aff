//! Payload multiplexer.
//!
//! Interleaves every item's Encrypt-then-MAC pipeline into one byte
//! stream under PRNG-driven scheduling, so item boundaries are invisible
//! without the manifest. The reader rebuilds the identical schedule from
//! the manifest's seed and drives the mirror-image demultiplex.
//!
//! Scheduling contract:
//! - one uniform index draw per segment; completed items are skipped by
//!   linear search, wrapping to index 0;
//! - a segment moves `min(MUX_STRIDE, available)` bytes; the first
//!   segment that moves fewer than a full stride completes its item on
//!   both sides, which keeps writer (EOF-driven) and reader
//!   (length-driven) draw sequences identical;
//! - Frameshift emits one PRNG-generated padding run after every segment,
//!   outside every item's MAC; the reader regenerates and checks it.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{self, FrameshiftParams, PayloadConfig, PayloadItem};
use crate::constants::{LAYOUT_FRAMESHIFT, LAYOUT_SIMPLE, MUX_STRIDE, PRNG_CHACHA20};
use crate::payload::pipeline::{ItemReader, ItemWriter};
use crate::payload::prng::SchedulingPrng;
use crate::registry::PrimitiveRegistry;
use crate::types::{AuthScope, PackageError, Result};
use crate::utils::{equal_ct, fmt_bytes, read_exact_or_eof};

/// Parsed payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    Simple,
    Frameshift(FrameshiftParams),
}

impl PayloadLayout {
    pub fn from_config(cfg: &PayloadConfig) -> Result<Self> {
        cfg.verify()?;
        match cfg.layout.as_str() {
            LAYOUT_SIMPLE => Ok(PayloadLayout::Simple),
            LAYOUT_FRAMESHIFT => {
                let params: FrameshiftParams = config::from_bytes(&cfg.layout_config)?;
                params.verify()?;
                Ok(PayloadLayout::Frameshift(params))
            }
            other => Err(PackageError::ConfigInvalid(format!(
                "unknown payload layout {:?}",
                other
            ))),
        }
    }

    pub fn to_config(&self, seed: [u8; 32]) -> Result<PayloadConfig> {
        let (layout, layout_config) = match self {
            PayloadLayout::Simple => (LAYOUT_SIMPLE.to_string(), Vec::new()),
            PayloadLayout::Frameshift(params) => {
                params.verify()?;
                (LAYOUT_FRAMESHIFT.to_string(), config::to_bytes(params)?)
            }
        };
        Ok(PayloadConfig {
            layout,
            layout_config,
            prng: PRNG_CHACHA20.to_string(),
            prng_config: seed.to_vec(),
        })
    }
}

/// Totals produced by one multiplex run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxTotals {
    /// Payload-body bytes: sum of item internal lengths plus padding.
    pub payload_len: u64,
    /// Inter-segment padding bytes.
    pub padding_len: u64,
}

/// Pre-keys for items that derive their working keys through a KDF,
/// indexed by item identifier.
pub type ItemPreKeys = HashMap<[u8; 16], Zeroizing<Vec<u8>>>;

fn verify_item_configs(items: &[PayloadItem], pre_keys: &ItemPreKeys) -> Result<()> {
    for item in items {
        item.verify()?;
        if item.cipher_cfg.is_aead() {
            return Err(PackageError::ConfigInvalid(
                "AEAD configurations cannot back a payload item".into(),
            ));
        }
        if !item.cipher_cfg.is_length_preserving() {
            return Err(PackageError::ConfigInvalid(
                "payload items require a length-preserving cipher configuration".into(),
            ));
        }
        // Keys must be resolvable before any bytes move.
        if !item.has_embedded_keys()
            && (item.kdf_cfg.is_none() || !pre_keys.contains_key(&item.identifier))
        {
            return Err(PackageError::ItemKeyMissing);
        }
    }
    Ok(())
}

/// Resolve an item's working keys: embedded keys win, else a registered
/// pre-key stretched through the item's KDF config.
fn resolve_item_keys(
    item: &PayloadItem,
    pre_keys: &ItemPreKeys,
    registry: &PrimitiveRegistry,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
    if item.has_embedded_keys() {
        let ck = item.cipher_key.as_ref().ok_or(PackageError::ItemKeyMissing)?;
        let ak = item.auth_key.as_ref().ok_or(PackageError::ItemKeyMissing)?;
        return Ok((
            Zeroizing::new(ck.clone()),
            Zeroizing::new(ak.clone()),
        ));
    }
    match (pre_keys.get(&item.identifier), &item.kdf_cfg) {
        (Some(pre_key), Some(kdf_cfg)) => registry.derive_working_keys(
            pre_key,
            item.cipher_cfg.key_len as usize,
            item.auth_cfg.key_len as usize,
            kdf_cfg,
        ),
        _ => Err(PackageError::ItemKeyMissing),
    }
}

fn build_writer(
    item: &PayloadItem,
    pre_keys: &ItemPreKeys,
    registry: &PrimitiveRegistry,
) -> Result<ItemWriter> {
    let (cipher_key, mac_key) = resolve_item_keys(item, pre_keys, registry)?;
    let engine = registry.create_cipher(true, &item.cipher_cfg, &cipher_key)?;
    let mac = registry.create_mac(&item.auth_cfg, &mac_key)?;
    ItemWriter::new(engine, mac)
}

fn build_reader(
    item: &PayloadItem,
    pre_keys: &ItemPreKeys,
    registry: &PrimitiveRegistry,
) -> Result<ItemReader> {
    let (cipher_key, mac_key) = resolve_item_keys(item, pre_keys, registry)?;
    let engine = registry.create_cipher(false, &item.cipher_cfg, &cipher_key)?;
    let mac = registry.create_mac(&item.auth_cfg, &mac_key)?;
    ItemReader::new(engine, mac)
}

/// One uniform draw, then linear search past completed items, wrapping to
/// index 0.
fn next_source(prng: &mut SchedulingPrng, completed: &[bool]) -> usize {
    let n = completed.len();
    let mut idx = prng.next_index(n);
    while completed[idx] {
        idx += 1;
        if idx == n {
            idx = 0;
        }
    }
    idx
}

/// Multiplex every item into `outer`, filling in each item's `auth_tag`
/// and `internal_length` as it completes.
pub fn write_payload<W: Write>(
    outer: &mut W,
    items: &mut [PayloadItem],
    sources: &mut [Box<dyn Read>],
    layout: PayloadLayout,
    prng: &mut SchedulingPrng,
    registry: &PrimitiveRegistry,
    pre_keys: &ItemPreKeys,
) -> Result<MuxTotals> {
    if items.is_empty() {
        return Err(PackageError::ConfigInvalid("payload has no items".into()));
    }
    if items.len() != sources.len() {
        return Err(PackageError::ConfigInvalid(
            "every payload item needs a source stream".into(),
        ));
    }
    verify_item_configs(items, pre_keys)?;

    let n = items.len();
    let mut pipelines: Vec<Option<ItemWriter>> = Vec::with_capacity(n);
    pipelines.resize_with(n, || None);
    let mut completed = vec![false; n];
    let mut remaining = n;
    let mut totals = MuxTotals::default();
    let mut stride = vec![0u8; MUX_STRIDE];
    debug!("mux write: {} items, layout {:?}", n, layout);

    while remaining > 0 {
        let idx = next_source(prng, &completed);
        if pipelines[idx].is_none() {
            pipelines[idx] = Some(build_writer(&items[idx], pre_keys, registry)?);
        }

        let got = read_exact_or_eof(&mut sources[idx], &mut stride)?;
        let pipeline = pipelines[idx].as_mut().expect("pipeline built for selected item");
        pipeline.write_segment(outer, &stride[..got])?;

        if got < MUX_STRIDE {
            // Source exhausted: finalize the item.
            let bound = config::to_bytes(&items[idx].authenticatible_clone())?;
            let pipeline = pipelines[idx].take().expect("pipeline built for selected item");
            let (tag, bytes_in, bytes_out) = pipeline.finish(outer, &bound)?;
            if items[idx].external_length > 0 && bytes_in != items[idx].external_length {
                return Err(PackageError::LengthMismatch {
                    expected: items[idx].external_length,
                    actual: bytes_in,
                });
            }
            items[idx].auth_tag = tag;
            items[idx].internal_length = bytes_out;
            totals.payload_len += bytes_out;
            completed[idx] = true;
            remaining -= 1;
            debug!(
                "mux write: item {} complete ({} bytes)",
                fmt_bytes(&items[idx].identifier),
                bytes_out
            );
        }

        if let PayloadLayout::Frameshift(params) = layout {
            let pad_len = prng.next_range(params.pad_min, params.pad_max) as usize;
            let mut pad = vec![0u8; pad_len];
            prng.fill(&mut pad);
            outer.write_all(&pad)?;
            totals.payload_len += pad_len as u64;
            totals.padding_len += pad_len as u64;
        }
    }

    stride.zeroize();
    debug!(
        "mux write: payload {} bytes, {} padding",
        totals.payload_len, totals.padding_len
    );
    Ok(totals)
}

/// Demultiplex `outer` into per-item sinks, verifying every item's MAC.
/// The schedule is rebuilt from the same PRNG the writer used; padding is
/// regenerated and checked, so any tampering inside the payload body is
/// caught even between items.
pub fn read_payload<R: Read>(
    outer: &mut R,
    items: &[PayloadItem],
    sinks: &mut [Box<dyn Write>],
    layout: PayloadLayout,
    prng: &mut SchedulingPrng,
    registry: &PrimitiveRegistry,
    pre_keys: &ItemPreKeys,
) -> Result<MuxTotals> {
    if items.is_empty() {
        return Err(PackageError::ConfigInvalid("payload has no items".into()));
    }
    if items.len() != sinks.len() {
        return Err(PackageError::ConfigInvalid(
            "every payload item needs a sink stream".into(),
        ));
    }
    verify_item_configs(items, pre_keys)?;

    let n = items.len();
    let mut pipelines: Vec<Option<ItemReader>> = Vec::with_capacity(n);
    pipelines.resize_with(n, || None);
    let mut completed = vec![false; n];
    let mut left: Vec<u64> = items.iter().map(|i| i.internal_length).collect();
    let mut remaining = n;
    let mut totals = MuxTotals::default();
    debug!("mux read: {} items, layout {:?}", n, layout);

    while remaining > 0 {
        let idx = next_source(prng, &completed);
        if pipelines[idx].is_none() {
            pipelines[idx] = Some(build_reader(&items[idx], pre_keys, registry)?);
        }

        let take = (MUX_STRIDE as u64).min(left[idx]) as usize;
        let pipeline = pipelines[idx].as_mut().expect("pipeline built for selected item");
        pipeline.read_segment(outer, take, &mut sinks[idx])?;
        left[idx] -= take as u64;
        totals.payload_len += take as u64;

        if take < MUX_STRIDE {
            // Manifest-declared length exhausted: finalize and verify.
            let bound = config::to_bytes(&items[idx].authenticatible_clone())?;
            let pipeline = pipelines[idx].take().expect("pipeline built for selected item");
            let (tag, bytes_out) = pipeline.finish(&mut sinks[idx], &bound)?;
            if !equal_ct(&tag, &items[idx].auth_tag) {
                return Err(PackageError::CiphertextAuthentication(AuthScope::PayloadItem));
            }
            if items[idx].external_length > 0 && bytes_out != items[idx].external_length {
                return Err(PackageError::LengthMismatch {
                    expected: items[idx].external_length,
                    actual: bytes_out,
                });
            }
            completed[idx] = true;
            remaining -= 1;
            debug!("mux read: item {} verified", fmt_bytes(&items[idx].identifier));
        }

        if let PayloadLayout::Frameshift(params) = layout {
            let pad_len = prng.next_range(params.pad_min, params.pad_max) as usize;
            let mut expected = vec![0u8; pad_len];
            prng.fill(&mut expected);
            let mut observed = vec![0u8; pad_len];
            let got = read_exact_or_eof(outer, &mut observed)?;
            if got != pad_len {
                return Err(PackageError::FormatInvalid(
                    "payload body ends before the manifest says it should".into(),
                ));
            }
            if !equal_ct(&observed, &expected) {
                return Err(PackageError::CiphertextAuthentication(AuthScope::PayloadItem));
            }
            totals.payload_len += pad_len as u64;
            totals.padding_len += pad_len as u64;
        }
    }

    debug!(
        "mux read: payload {} bytes, {} padding",
        totals.payload_len, totals.padding_len
    );
    Ok(totals)
}
