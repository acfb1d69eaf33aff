#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Cursor, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use obscur_core::package::io::{ItemSource, TempStorage};
    use obscur_core::{PackageReader, PackageWriter, PayloadLayout};

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

    /// Scratch directory removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "obscur-core-test-{}-{}",
                tag,
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            Scratch(dir)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn extract_contents(key: &[u8], package: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut reader = PackageReader::new_symmetric(key);
        let mut cursor = Cursor::new(package.to_vec());
        let view = reader.read_manifest(&mut cursor).unwrap();
        let names: Vec<String> = view.items.iter().map(|i| i.relative_path.clone()).collect();

        let mut buffers: Vec<Arc<Mutex<Vec<u8>>>> = Vec::new();
        reader
            .extract_to(&mut cursor, |_| {
                let buf = Arc::new(Mutex::new(Vec::new()));
                buffers.push(buf.clone());
                Ok(Box::new(SharedSink(buf)))
            })
            .unwrap();

        names
            .into_iter()
            .zip(buffers)
            .map(|(name, buf)| (name, buf.lock().unwrap().clone()))
            .collect()
    }

    #[test]
    fn add_file_round_trips_from_disk() {
        let scratch = Scratch::new("file");
        let file = scratch.path("report.bin");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 241) as u8).collect();
        fs::write(&file, &data).unwrap();

        let mut writer = PackageWriter::new_symmetric(b"file key");
        writer.add_file(&file).unwrap();
        let mut package = Vec::new();
        writer.write(&mut package).unwrap();

        let items = extract_contents(b"file key", &package);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "report.bin");
        assert_eq!(items[0].1, data);
    }

    #[test]
    fn add_directory_recursive_keeps_relative_paths() {
        let scratch = Scratch::new("dir");
        fs::create_dir_all(scratch.path("nested")).unwrap();
        fs::write(scratch.path("a.txt"), b"alpha").unwrap();
        fs::write(scratch.path("nested/b.txt"), b"beta").unwrap();

        let mut writer = PackageWriter::new_symmetric(b"dir key");
        writer.set_payload_layout(PayloadLayout::Simple);
        let ids = writer.add_directory(&scratch.0, true).unwrap();
        assert_eq!(ids.len(), 2);

        let mut package = Vec::new();
        writer.write(&mut package).unwrap();

        let items = extract_contents(b"dir key", &package);
        // Sorted by relative path at add time.
        assert_eq!(items[0].0, "a.txt");
        assert_eq!(items[0].1, b"alpha");
        assert_eq!(items[1].0, "nested/b.txt");
        assert_eq!(items[1].1, b"beta");
    }

    #[test]
    fn non_recursive_directory_skips_subdirectories() {
        let scratch = Scratch::new("flat");
        fs::create_dir_all(scratch.path("nested")).unwrap();
        fs::write(scratch.path("top.txt"), b"top").unwrap();
        fs::write(scratch.path("nested/deep.txt"), b"deep").unwrap();

        let mut writer = PackageWriter::new_symmetric(b"flat key");
        let ids = writer.add_directory(&scratch.0, false).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn file_backed_temp_storage_produces_the_same_package_shape() {
        let scratch = Scratch::new("temp");
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 199) as u8).collect();

        let mut writer = PackageWriter::new_symmetric(b"temp key");
        writer.set_temp_storage(TempStorage::File(scratch.path("payload.tmp")));
        writer.add_bytes("blob", data.clone()).unwrap();
        let mut package = Vec::new();
        writer.write(&mut package).unwrap();

        // The temp file is removed once the payload is replayed.
        assert!(!scratch.path("payload.tmp").exists());

        let items = extract_contents(b"temp key", &package);
        assert_eq!(items[0].1, data);
    }

    #[test]
    fn caller_supplied_item_with_reader_source_round_trips() {
        use obscur_core::config::{AuthConfig, CipherConfig, ItemKind, PayloadItem};
        use obscur_core::constants::{cipher_ids, mac_ids, mode_ids, padding_ids};

        let data = b"streamed straight from a reader".to_vec();
        let item = PayloadItem {
            identifier: [0xEE; 16],
            relative_path: "stream.bin".into(),
            kind: ItemKind::Binary,
            external_length: data.len() as u64,
            internal_length: 0,
            cipher_cfg: CipherConfig {
                cipher: cipher_ids::XSALSA20,
                mode: mode_ids::NONE,
                padding: padding_ids::NONE,
                key_len: 32,
                iv: vec![0xE1; 24],
            },
            auth_cfg: AuthConfig {
                mac: mac_ids::HMAC_SHA256,
                key_len: 32,
            },
            kdf_cfg: None,
            cipher_key: Some(vec![0xE2; 32]),
            auth_key: Some(vec![0xE3; 32]),
            auth_tag: Vec::new(),
        };

        let mut writer = PackageWriter::new_symmetric(b"reader key");
        writer.add_item(item, ItemSource::Reader(Box::new(Cursor::new(data.clone()))));
        let mut package = Vec::new();
        writer.write(&mut package).unwrap();

        let items = extract_contents(b"reader key", &package);
        assert_eq!(items[0].0, "stream.bin");
        assert_eq!(items[0].1, data);
    }
}
