use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::adapters::object_store::{BlobStore, TransferError, TransferOperation};
use crate::runtime::config::BenchConfig;

/// In-memory bucket recording every transfer it serves.
pub(crate) struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
    fail_downloads: bool,
    fail_uploads: bool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            downloads: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            fail_downloads: false,
            fail_uploads: false,
        }
    }

    pub(crate) fn failing_downloads(mut self) -> Self {
        self.fail_downloads = true;
        self
    }

    pub(crate) fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub(crate) fn seed_object(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .insert(key.to_string(), body.to_vec());
    }

    pub(crate) fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .get(key)
            .cloned()
    }

    pub(crate) fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .expect("poisoned mutex")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub(crate) fn uploaded_keys(&self) -> Vec<String> {
        self.uploads.lock().expect("poisoned mutex").clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.downloads.lock().expect("poisoned mutex").len()
            + self.uploads.lock().expect("poisoned mutex").len()
    }
}

impl BlobStore for MemoryStore {
    fn download(&self, remote_name: &str, local_path: &Path) -> Result<(), TransferError> {
        self.downloads
            .lock()
            .expect("poisoned mutex")
            .push(remote_name.to_string());
        if self.fail_downloads {
            return Err(TransferError::new(
                TransferOperation::Download,
                remote_name,
                "simulated network interruption",
            ));
        }

        let body = self.body(remote_name).ok_or_else(|| {
            TransferError::new(TransferOperation::Download, remote_name, "object not found")
        })?;
        std::fs::write(local_path, body).map_err(|error| {
            TransferError::new(TransferOperation::Download, remote_name, error.to_string())
        })
    }

    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<(), TransferError> {
        self.uploads
            .lock()
            .expect("poisoned mutex")
            .push(remote_name.to_string());
        if self.fail_uploads {
            return Err(TransferError::new(
                TransferOperation::Upload,
                remote_name,
                "simulated network interruption",
            ));
        }

        let body = std::fs::read(local_path).map_err(|error| {
            TransferError::new(TransferOperation::Upload, remote_name, error.to_string())
        })?;
        self.seed_object(remote_name, &body);
        Ok(())
    }
}

pub(crate) fn sample_config(bench_home: &Path) -> BenchConfig {
    BenchConfig {
        bench_home: bench_home.to_path_buf(),
        project_id: "bench-project".to_string(),
        bucket: "bench-bucket".to_string(),
        storage_endpoint: "http://127.0.0.1:9".to_string(),
        storage_region: "auto".to_string(),
    }
}

pub(crate) fn assert_no_scratch_left(bench_home: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(bench_home)
        .expect("bench home should be readable")
        .collect();
    assert!(
        leftovers.is_empty(),
        "scratch workspace leaked: {leftovers:?}"
    );
}
