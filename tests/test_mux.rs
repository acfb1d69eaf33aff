#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Read, Write};
    use std::sync::{Arc, Mutex};

    use obscur_core::config::{AuthConfig, CipherConfig, FrameshiftParams, ItemKind, KdfConfig, PayloadItem};
    use obscur_core::constants::{cipher_ids, kdf_ids, mac_ids, mode_ids, padding_ids, MUX_STRIDE};
    use obscur_core::payload::{read_payload, write_payload, ItemPreKeys, PayloadLayout, SchedulingPrng};
    use obscur_core::registry::PrimitiveRegistry;
    use obscur_core::types::{AuthScope, PackageError};
    use zeroize::Zeroizing;

    /// Sink whose buffer outlives the boxed writer handed to the mux.
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn test_item(tag: u8, data_len: usize) -> PayloadItem {
        PayloadItem {
            identifier: [tag; 16],
            relative_path: format!("item-{}", tag),
            kind: ItemKind::Binary,
            external_length: data_len as u64,
            internal_length: 0,
            cipher_cfg: CipherConfig {
                cipher: cipher_ids::XSALSA20,
                mode: mode_ids::NONE,
                padding: padding_ids::NONE,
                key_len: 32,
                iv: vec![tag; 24],
            },
            auth_cfg: AuthConfig {
                mac: mac_ids::HMAC_SHA256,
                key_len: 32,
            },
            kdf_cfg: None,
            cipher_key: Some(vec![tag.wrapping_add(1); 32]),
            auth_key: Some(vec![tag.wrapping_add(2); 32]),
            auth_tag: Vec::new(),
        }
    }

    fn test_data(tag: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(tag)).collect()
    }

    /// Run one multiplex over the given item sizes; returns the outer
    /// stream, the finalized items, and the totals.
    fn write_run(
        layout: PayloadLayout,
        seed: [u8; 32],
        sizes: &[usize],
    ) -> (Vec<u8>, Vec<PayloadItem>, obscur_core::payload::MuxTotals) {
        let registry = PrimitiveRegistry::new();
        let pre_keys: ItemPreKeys = HashMap::new();
        let mut prng = SchedulingPrng::from_seed(seed);

        let mut items: Vec<PayloadItem> = sizes
            .iter()
            .enumerate()
            .map(|(i, &len)| test_item(i as u8 + 1, len))
            .collect();
        let mut sources: Vec<Box<dyn Read>> = sizes
            .iter()
            .enumerate()
            .map(|(i, &len)| Box::new(Cursor::new(test_data(i as u8 + 1, len))) as Box<dyn Read>)
            .collect();

        let mut outer = Vec::new();
        let totals = write_payload(
            &mut outer,
            &mut items,
            &mut sources,
            layout,
            &mut prng,
            &registry,
            &pre_keys,
        )
        .unwrap();
        (outer, items, totals)
    }

    fn read_run(
        outer: &[u8],
        items: &[PayloadItem],
        layout: PayloadLayout,
        seed: [u8; 32],
    ) -> obscur_core::types::Result<Vec<Vec<u8>>> {
        let registry = PrimitiveRegistry::new();
        let pre_keys: ItemPreKeys = HashMap::new();
        let mut prng = SchedulingPrng::from_seed(seed);

        let buffers: Vec<Arc<Mutex<Vec<u8>>>> =
            items.iter().map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
        let mut sinks: Vec<Box<dyn Write>> = buffers
            .iter()
            .map(|b| Box::new(SharedSink(b.clone())) as Box<dyn Write>)
            .collect();

        let mut cursor = Cursor::new(outer.to_vec());
        read_payload(
            &mut cursor,
            items,
            &mut sinks,
            layout,
            &mut prng,
            &registry,
            &pre_keys,
        )?;
        Ok(buffers.iter().map(|b| b.lock().unwrap().clone()).collect())
    }

    #[test]
    fn simple_layout_round_trips_interleaved_items() {
        let seed = [7u8; 32];
        let sizes = [0usize, 100, 10_000, MUX_STRIDE, MUX_STRIDE * 3 + 5];
        let (outer, items, totals) = write_run(PayloadLayout::Simple, seed, &sizes);

        // Simple layout: payload is exactly the item ciphertexts.
        assert_eq!(totals.padding_len, 0);
        assert_eq!(outer.len() as u64, totals.payload_len);
        let internal_sum: u64 = items.iter().map(|i| i.internal_length).sum();
        assert_eq!(internal_sum, totals.payload_len);

        let recovered = read_run(&outer, &items, PayloadLayout::Simple, seed).unwrap();
        for (i, &len) in sizes.iter().enumerate() {
            assert_eq!(recovered[i], test_data(i as u8 + 1, len), "item {}", i);
        }
    }

    #[test]
    fn frameshift_round_trips_and_accounts_padding() {
        let seed = [3u8; 32];
        let params = FrameshiftParams {
            pad_min: 16,
            pad_max: 128,
        };
        let layout = PayloadLayout::Frameshift(params);
        let sizes = [100usize, MUX_STRIDE * 2];
        let (outer, items, totals) = write_run(layout, seed, &sizes);

        // Item bytes plus padding account for the whole body.
        let internal_sum: u64 = items.iter().map(|i| i.internal_length).sum();
        assert_eq!(internal_sum + totals.padding_len, totals.payload_len);
        assert_eq!(outer.len() as u64, totals.payload_len);
        assert!(totals.padding_len >= 16);

        let recovered = read_run(&outer, &items, layout, seed).unwrap();
        assert_eq!(recovered[0], test_data(1, 100));
        assert_eq!(recovered[1], test_data(2, MUX_STRIDE * 2));
    }

    // A fixed seed and item set produce a byte-identical payload body.
    #[test]
    fn identical_runs_produce_identical_bodies() {
        let seed = [0u8; 32];
        let layout = PayloadLayout::Frameshift(FrameshiftParams {
            pad_min: 16,
            pad_max: 128,
        });
        let sizes = [5000usize, 777, MUX_STRIDE];
        let (a, items_a, _) = write_run(layout, seed, &sizes);
        let (b, items_b, _) = write_run(layout, seed, &sizes);

        assert_eq!(a, b);
        for (ia, ib) in items_a.iter().zip(items_b.iter()) {
            assert_eq!(ia.auth_tag, ib.auth_tag);
            assert_eq!(ia.internal_length, ib.internal_length);
        }
    }

    #[test]
    fn wrong_seed_cannot_demultiplex() {
        // Enough segments that two seeds cannot produce the same schedule.
        let layout = PayloadLayout::Frameshift(FrameshiftParams {
            pad_min: 16,
            pad_max: 128,
        });
        let (outer, items, _) = write_run(layout, [1u8; 32], &[MUX_STRIDE * 20, MUX_STRIDE * 30]);
        assert!(read_run(&outer, &items, layout, [2u8; 32]).is_err());
    }

    #[test]
    fn tampered_body_fails_item_authentication() {
        let seed = [9u8; 32];
        let (mut outer, items, _) = write_run(PayloadLayout::Simple, seed, &[10_000]);
        outer[1024] ^= 0x01;

        let err = read_run(&outer, &items, PayloadLayout::Simple, seed).unwrap_err();
        assert!(matches!(
            err,
            PackageError::CiphertextAuthentication(AuthScope::PayloadItem)
        ));
    }

    #[test]
    fn tampered_frameshift_padding_is_detected() {
        let seed = [11u8; 32];
        let layout = PayloadLayout::Frameshift(FrameshiftParams {
            pad_min: 32,
            pad_max: 32,
        });
        let (mut outer, items, totals) = write_run(layout, seed, &[64]);
        // With one segment and fixed-width padding, the final 32 bytes are
        // the padding run.
        assert_eq!(totals.padding_len, 32);
        let last = outer.len() - 1;
        outer[last] ^= 0x80;

        assert!(read_run(&outer, &items, layout, seed).is_err());
    }

    #[test]
    fn kdf_derived_item_keys_round_trip() {
        let registry = PrimitiveRegistry::new();
        let seed = [5u8; 32];
        let data = test_data(1, 2000);

        let mut item = test_item(1, data.len());
        item.cipher_key = None;
        item.auth_key = None;
        item.kdf_cfg = Some(KdfConfig {
            kdf: kdf_ids::HKDF_SHA256,
            salt: vec![6; 16],
            log2_n: 0,
            r: 0,
            p: 0,
            iterations: 0,
        });

        let mut pre_keys: ItemPreKeys = HashMap::new();
        pre_keys.insert(item.identifier, Zeroizing::new(b"item pre-key".to_vec()));

        let mut items = vec![item];
        let mut sources: Vec<Box<dyn Read>> =
            vec![Box::new(Cursor::new(data.clone())) as Box<dyn Read>];
        let mut outer = Vec::new();
        let mut prng = SchedulingPrng::from_seed(seed);
        write_payload(
            &mut outer,
            &mut items,
            &mut sources,
            PayloadLayout::Simple,
            &mut prng,
            &registry,
            &pre_keys,
        )
        .unwrap();

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut sinks: Vec<Box<dyn Write>> = vec![Box::new(SharedSink(buffer.clone()))];
        let mut prng = SchedulingPrng::from_seed(seed);
        read_payload(
            &mut Cursor::new(outer),
            &items,
            &mut sinks,
            PayloadLayout::Simple,
            &mut prng,
            &registry,
            &pre_keys,
        )
        .unwrap();

        assert_eq!(*buffer.lock().unwrap(), data);
    }

    #[test]
    fn missing_pre_key_is_item_key_missing() {
        let registry = PrimitiveRegistry::new();
        let mut item = test_item(1, 10);
        item.cipher_key = None;
        item.auth_key = None;
        item.kdf_cfg = Some(KdfConfig {
            kdf: kdf_ids::HKDF_SHA256,
            salt: vec![6; 16],
            log2_n: 0,
            r: 0,
            p: 0,
            iterations: 0,
        });

        let mut items = vec![item];
        let mut sources: Vec<Box<dyn Read>> =
            vec![Box::new(Cursor::new(vec![0u8; 10])) as Box<dyn Read>];
        let mut outer = Vec::new();
        let mut prng = SchedulingPrng::from_seed([0u8; 32]);
        let err = write_payload(
            &mut outer,
            &mut items,
            &mut sources,
            PayloadLayout::Simple,
            &mut prng,
            &registry,
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PackageError::ItemKeyMissing));
    }

    #[test]
    fn non_length_preserving_item_config_is_rejected() {
        // Padded CBC expands; CTS holds a block back between segments.
        // Neither can keep the writer and reader schedules aligned.
        let configs = [
            CipherConfig {
                cipher: cipher_ids::AES256,
                mode: mode_ids::CBC,
                padding: padding_ids::PKCS7,
                key_len: 32,
                iv: vec![1; 16],
            },
            CipherConfig {
                cipher: cipher_ids::AES256,
                mode: mode_ids::CTS,
                padding: padding_ids::NONE,
                key_len: 32,
                iv: vec![1; 16],
            },
        ];
        for cfg in configs {
            let registry = PrimitiveRegistry::new();
            let mut item = test_item(1, 10);
            item.cipher_cfg = cfg;

            let mut items = vec![item];
            let mut sources: Vec<Box<dyn Read>> =
                vec![Box::new(Cursor::new(vec![0u8; 10])) as Box<dyn Read>];
            let mut outer = Vec::new();
            let mut prng = SchedulingPrng::from_seed([0u8; 32]);
            let err = write_payload(
                &mut outer,
                &mut items,
                &mut sources,
                PayloadLayout::Simple,
                &mut prng,
                &registry,
                &HashMap::new(),
            )
            .unwrap_err();
            assert!(matches!(err, PackageError::ConfigInvalid(_)));
            assert!(outer.is_empty(), "rejected before any I/O");
        }
    }
}
