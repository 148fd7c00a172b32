// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Multipart Downloader (component D): probe object size/ETag, preallocate
//! output, fetch ranges in parallel, verify integrity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nominal_kernel::error::{Error, Result};
use nominal_kernel::http::HttpClient;
use nominal_kernel::presign::PresignedUrlProvider;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Description of a single file to download.
pub struct DownloadItem {
    /// Presigned-URL provider for this object.
    pub provider: Arc<PresignedUrlProvider>,
    /// Where to write the downloaded file.
    pub destination: PathBuf,
    /// Byte size of each ranged GET.
    pub part_size: u64,
}

/// Outcome of a multi-file download.
#[derive(Default)]
pub struct DownloadResults {
    /// Destinations that downloaded successfully.
    pub succeeded: Vec<PathBuf>,
    /// Destinations that failed, with the error that caused it.
    pub failed: HashMap<PathBuf, Error>,
}

struct PlannedDownload {
    destination: PathBuf,
    provider: Arc<PresignedUrlProvider>,
    part_size: u64,
    total_size: u64,
    etag: Option<String>,
}

struct RangeBounds {
    start: u64,
    end: u64,
}

impl PlannedDownload {
    /// Partition `[0, total_size-1]` into contiguous inclusive ranges of
    /// `part_size` bytes each (the last one possibly shorter).
    fn ranges(&self) -> Vec<RangeBounds> {
        if self.total_size == 0 {
            return vec![RangeBounds { start: 0, end: 0 }];
        }
        let parts = self.total_size.div_ceil(self.part_size).max(1);
        (0..parts)
            .map(|i| {
                let start = i * self.part_size;
                let end = (self.total_size - 1).min(start + self.part_size - 1);
                RangeBounds { start, end }
            })
            .collect()
    }
}

/// Downloader sharing one HTTP client and worker budget across many files.
pub struct DownloadClient {
    http: Arc<HttpClient>,
    max_part_retries: u32,
}

impl DownloadClient {
    /// Construct a downloader. `max_part_retries` bounds retries per range
    /// on transient or presign-expiry failures.
    pub fn new(http: Arc<HttpClient>, max_part_retries: u32) -> Self {
        Self {
            http,
            max_part_retries,
        }
    }

    /// Download a single item, raising the first error encountered.
    pub async fn download_file(&self, item: DownloadItem) -> Result<PathBuf> {
        let destination = item.destination.clone();
        let mut results = self.download_files(vec![item]).await;
        if let Some(err) = results.failed.remove(&destination) {
            return Err(err);
        }
        Ok(destination)
    }

    /// Download many files using a shared worker budget.
    pub async fn download_files(&self, items: Vec<DownloadItem>) -> DownloadResults {
        let mut failed: HashMap<PathBuf, Error> = HashMap::new();
        let mut surviving = Vec::new();

        for item in items {
            match check_destination(&item.destination) {
                Ok(()) => surviving.push(item),
                Err(err) => {
                    failed.insert(item.destination, err);
                }
            }
        }

        let mut plans = Vec::new();
        for item in surviving {
            match self.plan_item(&item).await {
                Ok(plan) => {
                    if let Err(err) = preallocate(&plan.destination, plan.total_size).await {
                        failed.insert(plan.destination, err);
                    } else {
                        plans.push(plan);
                    }
                }
                Err(err) => {
                    failed.insert(item.destination, err);
                }
            }
        }

        let exec_failed = self.run_downloads(&plans).await;

        let mut succeeded = Vec::new();
        for plan in &plans {
            if !exec_failed.contains_key(&plan.destination) {
                succeeded.push(plan.destination.clone());
            }
        }

        for (dest, err) in exec_failed {
            tracing::warn!(destination = %dest.display(), error = %err, "removing partial download artifact");
            let _ = tokio::fs::remove_file(&dest).await;
            failed.insert(dest, err);
        }

        DownloadResults { succeeded, failed }
    }

    async fn plan_item(&self, item: &DownloadItem) -> Result<PlannedDownload> {
        let (total_size, etag) = self.head_or_probe(&item.provider).await?;
        Ok(PlannedDownload {
            destination: item.destination.clone(),
            provider: item.provider.clone(),
            part_size: item.part_size,
            total_size,
            etag,
        })
    }

    async fn head_or_probe(&self, provider: &PresignedUrlProvider) -> Result<(u64, Option<String>)> {
        let mut last_status = 0u16;
        for attempt in 0..3 {
            let url = provider.get(attempt > 0).await?;

            match self.http.head(&url).await {
                Ok(response) => {
                    if response.status().is_success() {
                        if let Some(len) = content_length(&response) {
                            return Ok((len, etag_of(&response)));
                        }
                    } else if is_expired_status(response.status().as_u16()) {
                        last_status = response.status().as_u16();
                        provider.invalidate().await;
                        continue;
                    }
                }
                Err(_) => {
                    // fall through to the ranged-GET probe below
                }
            }

            match self.http.get_range(&url, 0, 0).await {
                Ok(response) => {
                    if response.status().is_success() || response.status().as_u16() == 206 {
                        if let Some(total) = content_range_total(&response).or_else(|| content_length(&response)) {
                            return Ok((total, etag_of(&response)));
                        }
                    }
                }
                Err(Error::Api { status, .. }) if is_expired_status(status) => {
                    last_status = status;
                    provider.invalidate().await;
                    continue;
                }
                Err(Error::Api { status, message }) => return Err(Error::Api { status, message }),
                Err(other) => return Err(other),
            }
        }
        Err(Error::PresignExpired { status: last_status })
    }

    async fn run_downloads(&self, plans: &[PlannedDownload]) -> HashMap<PathBuf, Error> {
        use tokio::sync::Mutex;

        let cancelled: Vec<Arc<std::sync::atomic::AtomicBool>> = plans
            .iter()
            .map(|_| Arc::new(std::sync::atomic::AtomicBool::new(false)))
            .collect();
        let failed: Arc<Mutex<HashMap<PathBuf, Error>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut tasks = tokio::task::JoinSet::new();
        for (idx, plan) in plans.iter().enumerate() {
            for range in plan.ranges() {
                let destination = plan.destination.clone();
                let provider = plan.provider.clone();
                let etag = plan.etag.clone();
                let max_part_retries = self.max_part_retries;
                let http = self.http.clone();
                let cancel_flag = cancelled[idx].clone();
                let failed = failed.clone();

                tasks.spawn(async move {
                    if cancel_flag.load(std::sync::atomic::Ordering::Relaxed) {
                        return;
                    }
                    let result = fetch_range_with_retry(
                        &http,
                        &provider,
                        range.start,
                        range.end,
                        etag.as_deref(),
                        &destination,
                        max_part_retries,
                    )
                    .await;

                    if let Err(err) = result {
                        tracing::error!(destination = %destination.display(), start = range.start, error = %err, "range download failed");
                        cancel_flag.store(true, std::sync::atomic::Ordering::Relaxed);
                        let mut guard = failed.lock().await;
                        guard.entry(destination).or_insert(err);
                    }
                });
            }
        }

        while tasks.join_next().await.is_some() {}

        Arc::try_unwrap(failed)
            .map(Mutex::into_inner)
            .unwrap_or_default()
    }
}

async fn fetch_range_with_retry(
    http: &HttpClient,
    provider: &PresignedUrlProvider,
    start: u64,
    end: u64,
    expected_etag: Option<&str>,
    destination: &Path,
    max_part_retries: u32,
) -> Result<()> {
    let mut last_err = None;
    for _ in 0..max_part_retries.max(1) {
        let url = provider.get(false).await?;
        match http.get_range(&url, start, end).await {
            Ok(response) => {
                if let (Some(expected), Some(actual)) = (expected_etag, etag_of(&response)) {
                    if expected != actual {
                        return Err(Error::Integrity {
                            message: "object changed during download".to_string(),
                            path: Some(destination.to_path_buf()),
                        });
                    }
                }
                let bytes = response.bytes().await.map_err(|source| Error::Transport { source })?;
                write_part(destination, start, &bytes).await?;
                return Ok(());
            }
            Err(Error::Api { status, message }) if is_expired_status(status) => {
                provider.invalidate().await;
                last_err = Some(Error::Api { status, message });
                continue;
            }
            Err(err @ Error::Api { .. }) => return Err(err),
            Err(other) => {
                last_err = Some(other);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::config("range download failed with no recorded error")))
}

fn is_expired_status(status: u16) -> bool {
    Error::is_expired_presign_status(status)
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Content-Range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|v| v.parse().ok())
}

fn etag_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("ETag")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"').to_string())
}

fn check_destination(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        return Err(Error::config(format!(
            "output directory does not exist: {}",
            parent.display()
        )));
    }
    if path.exists() {
        return Err(Error::config(format!(
            "destination already exists: {}",
            path.display()
        )));
    }
    Ok(())
}

async fn preallocate(path: &Path, total_size: u64) -> Result<()> {
    let file = tokio::fs::File::create(path).await?;
    file.set_len(total_size).await?;
    Ok(())
}

async fn write_part(path: &Path, start: u64, data: &[u8]) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    file.write_all(data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(total_size: u64, part_size: u64) -> PlannedDownload {
        PlannedDownload {
            destination: PathBuf::from("/tmp/does-not-matter"),
            provider: Arc::new(PresignedUrlProvider::new(
                std::time::Duration::from_secs(1),
                std::time::Duration::from_secs(0),
                || async { Ok("https://example.com".to_string()) },
            )),
            part_size,
            total_size,
            etag: None,
        }
    }

    #[test]
    fn ranges_partition_the_whole_interval_scenario_3() {
        let plan = plan(10_485_760, 4_194_304);
        let ranges = plan.ranges();
        let bounds: Vec<(u64, u64)> = ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(
            bounds,
            vec![(0, 4_194_303), (4_194_304, 8_388_607), (8_388_608, 10_485_759)]
        );
    }

    #[test]
    fn ranges_cover_without_overlap_for_arbitrary_sizes() {
        for total in [1u64, 100, 4_194_304, 4_194_305, 200_000_000] {
            for part in [1u64, 4_194_304, 64_000_000] {
                let plan = plan(total, part);
                let ranges = plan.ranges();
                let mut covered = 0u64;
                for (i, r) in ranges.iter().enumerate() {
                    if i == 0 {
                        assert_eq!(r.start, 0);
                    } else {
                        assert_eq!(r.start, ranges[i - 1].end + 1);
                    }
                    covered += r.end - r.start + 1;
                }
                assert_eq!(covered, total);
                assert_eq!(ranges.last().unwrap().end, total - 1);
            }
        }
    }

    #[test]
    fn check_destination_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.bin");
        std::fs::write(&path, b"x").unwrap();
        assert!(check_destination(&path).is_err());
    }

    #[test]
    fn check_destination_rejects_missing_parent() {
        let path = PathBuf::from("/definitely/not/a/real/directory/file.bin");
        assert!(check_destination(&path).is_err());
    }

    #[test]
    fn check_destination_accepts_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.bin");
        assert!(check_destination(&path).is_ok());
    }
}
