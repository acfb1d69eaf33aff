#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use obscur_core::config::KdfConfig;
    use obscur_core::constants::kdf_ids;
    use obscur_core::crypto::derive_working_keys;
    use obscur_core::types::PackageError;

    fn scrypt_cfg(salt: Vec<u8>) -> KdfConfig {
        KdfConfig {
            kdf: kdf_ids::SCRYPT,
            salt,
            log2_n: 8,
            r: 8,
            p: 1,
            iterations: 0,
        }
    }

    fn pbkdf2_cfg(salt: Vec<u8>) -> KdfConfig {
        KdfConfig {
            kdf: kdf_ids::PBKDF2,
            salt,
            log2_n: 0,
            r: 0,
            p: 0,
            iterations: 2048,
        }
    }

    fn hkdf_cfg(salt: Vec<u8>) -> KdfConfig {
        KdfConfig {
            kdf: kdf_ids::HKDF_SHA256,
            salt,
            log2_n: 0,
            r: 0,
            p: 0,
            iterations: 0,
        }
    }

    // One derivation call, deterministic and idempotent.
    #[test]
    fn derivation_is_deterministic() {
        for cfg in [
            scrypt_cfg(vec![1; 16]),
            pbkdf2_cfg(vec![1; 16]),
            hkdf_cfg(vec![1; 16]),
        ] {
            let (c1, m1) = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap();
            let (c2, m2) = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap();
            assert_eq!(c1, c2);
            assert_eq!(m1, m2);
        }
    }

    #[test]
    fn split_produces_requested_lengths_and_distinct_keys() {
        let cfg = scrypt_cfg(vec![9; 16]);
        let (cipher_key, mac_key) = derive_working_keys(b"pre-key", 32, 64, &cfg).unwrap();
        assert_eq!(cipher_key.len(), 32);
        assert_eq!(mac_key.len(), 64);
        assert_ne!(&cipher_key[..32], &mac_key[..32]);
    }

    #[test]
    fn different_salts_give_different_keys() {
        let (c1, _) = derive_working_keys(b"pre-key", 32, 32, &scrypt_cfg(vec![1; 16])).unwrap();
        let (c2, _) = derive_working_keys(b"pre-key", 32, 32, &scrypt_cfg(vec![2; 16])).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn different_pre_keys_give_different_keys() {
        let cfg = hkdf_cfg(vec![7; 16]);
        let (c1, _) = derive_working_keys(b"pre-key-a", 32, 32, &cfg).unwrap();
        let (c2, _) = derive_working_keys(b"pre-key-b", 32, 32, &cfg).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn scrypt_memory_cap_is_enforced() {
        let mut cfg = scrypt_cfg(vec![1; 16]);
        cfg.log2_n = 22;
        cfg.r = 64; // 128 * 2^22 * 64 far exceeds the cap
        let err = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap_err();
        assert!(matches!(err, PackageError::ConfigInvalid(_)));
    }

    #[test]
    fn scrypt_zero_r_is_rejected() {
        let mut cfg = scrypt_cfg(vec![1; 16]);
        cfg.r = 0;
        let err = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap_err();
        assert!(matches!(err, PackageError::ConfigInvalid(_)));
    }

    #[test]
    fn pbkdf2_iteration_floor_is_enforced() {
        let mut cfg = pbkdf2_cfg(vec![1; 16]);
        cfg.iterations = 100;
        let err = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap_err();
        assert!(matches!(err, PackageError::ConfigInvalid(_)));
    }

    #[test]
    fn empty_salt_is_rejected() {
        let err = derive_working_keys(b"pre-key", 32, 32, &scrypt_cfg(Vec::new())).unwrap_err();
        assert!(matches!(err, PackageError::ConfigInvalid(_)));
    }

    #[test]
    fn empty_pre_key_is_rejected() {
        let err = derive_working_keys(b"", 32, 32, &hkdf_cfg(vec![1; 16])).unwrap_err();
        assert!(matches!(err, PackageError::ConfigInvalid(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_hkdf_deterministic_over_salts(salt in proptest::collection::vec(any::<u8>(), 1..64)) {
            let cfg = hkdf_cfg(salt);
            let (c1, m1) = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap();
            let (c2, m2) = derive_working_keys(b"pre-key", 32, 32, &cfg).unwrap();
            prop_assert_eq!(c1, c2);
            prop_assert_eq!(m1, m2);
        }
    }
}
