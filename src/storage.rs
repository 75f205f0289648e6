//! Object access through OpenDAL.
//!
//! File-based engines and the export writer address data by URL:
//! - `file:///abs/path/data.csv` or a bare path for the local filesystem
//! - `s3://bucket/key` for S3 and S3-compatible stores
//!
//! A URL resolves to a [`Location`]: an operator rooted at the parent
//! directory (or bucket) plus the object path below that root.
//!
//! OpenDAL's services need a Tokio reactor while the crate runs on smol, so
//! every operator call is spawned onto a crate-owned I/O runtime and awaited
//! from whichever executor the caller uses.

use anyhow::{anyhow, Result};
use futures::StreamExt;
use opendal::layers::LoggingLayer;
use opendal::services::{Fs, S3};
use opendal::{EntryMode, Operator};
use std::future::Future;
use std::path::Path;
use std::sync::LazyLock;
use tokio::runtime::Runtime;
use url::Url;

use crate::datasource::SourceParams;
use crate::error::{DdfError, DdfResult};

/// Region used for `s3://` URLs that carry none.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

static IO_RUNTIME: LazyLock<std::io::Result<Runtime>> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("ddf-storage-io")
        .build()
});

/// Run an operator future on the I/O runtime and wait for its output.
async fn on_io_runtime<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let runtime = IO_RUNTIME
        .as_ref()
        .map_err(|e| anyhow!("Failed to create storage runtime: {}", e))?;
    runtime
        .spawn(future)
        .await
        .map_err(|e| anyhow!("Storage task failed: {}", e))?
}

/// An operator and the object path it should be asked for.
#[derive(Clone, Debug)]
pub struct Location {
    pub operator: Operator,
    pub path: String,
}

fn fs_operator(root: &Path) -> Result<Operator> {
    let mut builder = Fs::default();
    builder = builder.root(
        root.to_str()
            .ok_or_else(|| anyhow!("Invalid path encoding"))?,
    );

    let op = Operator::new(builder)?
        .layer(LoggingLayer::default())
        .finish();

    Ok(op)
}

fn s3_operator(
    bucket: &str,
    region: Option<&str>,
    endpoint: Option<&str>,
    root: Option<&str>,
) -> Result<Operator> {
    let mut builder = S3::default();

    builder = builder
        .bucket(bucket)
        .region(region.unwrap_or(DEFAULT_S3_REGION));

    // Custom endpoint for S3-compatible services
    if let Some(ep) = endpoint {
        if !ep.is_empty() {
            builder = builder.endpoint(ep);
        }
    }
    if let Some(root) = root {
        builder = builder.root(root);
    }

    let op = Operator::new(builder)?
        .layer(LoggingLayer::default())
        .finish();

    Ok(op)
}

/// Build an operator for the root described by engine parameters.
pub fn operator_for_params(params: &SourceParams) -> Result<Operator> {
    match params {
        SourceParams::File { path, .. } => fs_operator(path),
        SourceParams::ObjectStore {
            bucket,
            region,
            endpoint,
            root,
            ..
        } => s3_operator(bucket, region.as_deref(), endpoint.as_deref(), root.as_deref()),
        SourceParams::Server { .. } => Err(anyhow!("Server parameters have no object storage")),
        SourceParams::InMemory { .. } => Err(anyhow!("In-memory parameters have no object storage")),
    }
}

/// Normalize path (ensure no leading slash for OpenDAL).
fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn split_local(path: &Path, url: &str) -> DdfResult<Location> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DdfError::invalid_uri(url, "path has no file name"))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()
            .map_err(|e| DdfError::invalid_uri(url, e.to_string()))?,
    };

    let operator =
        fs_operator(&parent).map_err(|e| DdfError::invalid_uri(url, e.to_string()))?;
    Ok(Location {
        operator,
        path: file_name.to_string(),
    })
}

/// Resolve a data URL to an operator and object path.
pub fn resolve(url: &str) -> DdfResult<Location> {
    if url.trim().is_empty() {
        return Err(DdfError::invalid_uri(url, "empty location"));
    }

    if !url.contains("://") {
        return split_local(Path::new(url), url);
    }

    let parsed = Url::parse(url).map_err(|e| DdfError::invalid_uri(url, e.to_string()))?;
    match parsed.scheme() {
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| DdfError::invalid_uri(url, "not an absolute file path"))?;
            split_local(&path, url)
        }
        "s3" | "s3a" => {
            let bucket = parsed
                .host_str()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| DdfError::invalid_uri(url, "missing bucket"))?;
            let key = normalize_path(parsed.path());
            if key.is_empty() {
                return Err(DdfError::invalid_uri(url, "missing object key"));
            }
            let operator = s3_operator(bucket, None, None, None)
                .map_err(|e| DdfError::invalid_uri(url, e.to_string()))?;
            Ok(Location {
                operator,
                path: key.to_string(),
            })
        }
        other => Err(DdfError::invalid_uri(
            url,
            format!("unsupported storage scheme '{}'", other),
        )),
    }
}

/// Read a whole object.
pub async fn read(location: &Location) -> Result<Vec<u8>> {
    let Location { operator, path } = location.clone();
    on_io_runtime(async move {
        let buffer = operator.read(&path).await?;
        Ok(buffer.to_vec())
    })
    .await
}

/// Write a whole object, replacing any previous content.
pub async fn write(location: &Location, data: Vec<u8>) -> Result<()> {
    let Location { operator, path } = location.clone();
    on_io_runtime(async move {
        operator.write(&path, data).await?;
        Ok(())
    })
    .await
}

/// Verify that an operator's root is reachable.
pub async fn check(operator: &Operator) -> Result<()> {
    let operator = operator.clone();
    on_io_runtime(async move {
        operator.check().await?;
        Ok(())
    })
    .await
}

/// Names of the files directly under `dir` of an operator, sorted.
pub async fn list_files(operator: &Operator, dir: &str) -> Result<Vec<String>> {
    let dir = normalize_path(dir);
    let dir = if dir.is_empty() {
        "/".to_string()
    } else if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    };

    let operator = operator.clone();
    on_io_runtime(async move {
        let mut lister = operator.lister_with(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = lister.next().await {
            let entry = entry?;
            if entry.metadata().mode() == EntryMode::FILE {
                names.push(entry.name().to_string());
            }
        }
        names.sort();
        Ok(names)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_file_url() {
        let location = resolve("file:///tmp/ddf/data.csv").unwrap();
        assert_eq!(location.path, "data.csv");
    }

    #[test]
    fn test_resolve_bare_path() {
        let location = resolve("/tmp/ddf/out.tsv").unwrap();
        assert_eq!(location.path, "out.tsv");
    }

    #[test]
    fn test_resolve_s3_url() {
        let location = resolve("s3://bucket/dir/part-0.csv").unwrap();
        assert_eq!(location.path, "dir/part-0.csv");
    }

    #[test]
    fn test_resolve_rejects_bad_urls() {
        assert!(matches!(resolve(""), Err(DdfError::InvalidUri { .. })));
        assert!(matches!(resolve("s3://bucket"), Err(DdfError::InvalidUri { .. })));
        assert!(matches!(
            resolve("ftp://host/file.csv"),
            Err(DdfError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_read_write_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        let location = resolve(path.to_str().unwrap()).unwrap();

        smol::block_on(async {
            write(&location, b"a,b\n1,2\n".to_vec()).await.unwrap();
            assert_eq!(read(&location).await.unwrap(), b"a,b\n1,2\n".to_vec());

            let names = list_files(&location.operator, "").await.unwrap();
            assert_eq!(names, vec!["sample.csv".to_string()]);
        });
    }

    #[test]
    fn test_storage_calls_run_without_outer_tokio_runtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        let operator = operator_for_params(&SourceParams::file(dir.path(), false)).unwrap();

        assert!(tokio::runtime::Handle::try_current().is_err());
        smol::block_on(async {
            check(&operator).await.unwrap();
            let location = Location {
                operator: operator.clone(),
                path: "a.csv".to_string(),
            };
            assert_eq!(read(&location).await.unwrap(), b"x\n1\n".to_vec());
            assert!(read(&Location {
                operator,
                path: "missing.csv".to_string(),
            })
            .await
            .is_err());
        });
    }
}
