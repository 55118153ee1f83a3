//! Source packaging.
//!
//! The project tree is packed into a gzipped tarball that Cloud Build uses
//! as its build context. Entries are sorted and their headers normalized
//! (mtime, owner, mode) so an unchanged tree always yields the same bytes,
//! and therefore the same object name.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tar::{Builder, EntryType, Header};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::DockerfileConfig;
use crate::error::DeployError;

pub const DOCKERFILE: &str = "Dockerfile";
pub const PROCFILE: &str = "Procfile";

/// Content type of uploaded archives.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Never shipped to the builder.
const ALWAYS_EXCLUDED: &[&str] = &[".git", "target", ".goblet"];

const DEFAULT_RUST_VERSION: &str = "1.90";

/// Hex characters of the digest used in object names.
const OBJECT_DIGEST_LEN: usize = 12;

/// A packed source tree.
#[derive(Debug, Clone)]
pub struct SourceArchive {
    bytes: Vec<u8>,
    sha256: String,
    files: usize,
}

impl SourceArchive {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the compressed archive.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Compressed size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `goblet/{service}/source-{digest prefix}.tar.gz`
    pub fn object_name(&self, service: &str) -> String {
        let digest = &self.sha256[..OBJECT_DIGEST_LEN.min(self.sha256.len())];
        format!("goblet/{service}/source-{digest}.tar.gz")
    }
}

/// Render the Dockerfile written for projects that ship none.
///
/// Builds the release binary in a Rust image and runs it with `serve` in a
/// slim runtime image. `dockerfile.binary` wins over `default_binary`.
pub fn default_dockerfile(config: &DockerfileConfig, default_binary: &str) -> String {
    let binary = config.binary.as_deref().unwrap_or(default_binary);
    let rust_version = config.rust_version.as_deref().unwrap_or(DEFAULT_RUST_VERSION);

    format!(
        r#"FROM rust:{rust_version} AS builder
WORKDIR /usr/src/app
COPY . .
RUN cargo build --release --bin {binary}

FROM debian:bookworm-slim
RUN apt-get update \
    && apt-get install -y --no-install-recommends ca-certificates \
    && rm -rf /var/lib/apt/lists/*
COPY --from=builder /usr/src/app/target/release/{binary} /usr/local/bin/app
ENV PORT=8080
CMD ["app", "serve"]
"#
    )
}

/// Write the default Dockerfile unless a `Dockerfile` or `Procfile` exists.
///
/// Without `dockerfile.binary` the binary is named after the project
/// directory as-is, falling back to `service`. Returns whether a file was
/// written.
pub fn ensure_dockerfile(
    project_dir: &Path,
    config: &DockerfileConfig,
    service: &str,
) -> Result<bool, DeployError> {
    if project_dir.join(DOCKERFILE).exists() || project_dir.join(PROCFILE).exists() {
        return Ok(false);
    }

    let binary = project_binary_name(project_dir).unwrap_or_else(|| service.to_string());
    info!(binary = %binary, "No Dockerfile or Procfile found, writing default Dockerfile");
    fs::write(
        project_dir.join(DOCKERFILE),
        default_dockerfile(config, &binary),
    )?;
    Ok(true)
}

fn project_binary_name(project_dir: &Path) -> Option<String> {
    let dir = project_dir.canonicalize().ok()?;
    dir.file_name()?.to_str().map(str::to_string)
}

/// Pack `project_dir` into a deterministic `.tar.gz`.
///
/// `exclude` holds paths relative to the project root; a directory entry
/// excludes everything below it. Symlinks are not followed or archived.
pub fn package_source(project_dir: &Path, exclude: &[String]) -> Result<SourceArchive, DeployError> {
    let excluded: Vec<PathBuf> = ALWAYS_EXCLUDED
        .iter()
        .map(PathBuf::from)
        .chain(
            exclude
                .iter()
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        )
        .collect();

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    let mut files = 0usize;

    let walker = WalkDir::new(project_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(project_dir)
                .map(|rel| !excluded.iter().any(|ex| rel.starts_with(ex)))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "Skipping symlink");
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(project_dir)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let metadata = entry.metadata()?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(metadata.len());
        header.set_mode(file_mode(&metadata));
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        let reader = BufReader::new(File::open(entry.path())?);
        builder.append_data(&mut header, archive_path(rel), reader)?;
        files += 1;
    }

    let bytes = builder.into_inner()?.finish()?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    debug!(files, size = bytes.len(), sha256 = %sha256, "Packaged source");

    Ok(SourceArchive {
        bytes,
        sha256,
        files,
    })
}

/// Forward-slash path inside the archive.
fn archive_path(rel: &Path) -> PathBuf {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
        .into()
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tar::Archive;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn entries(archive: &SourceArchive) -> Vec<String> {
        let mut tar = Archive::new(GzDecoder::new(archive.bytes()));
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn writes_default_dockerfile_once() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("my_app");
        fs::create_dir(&dir).unwrap();
        let config = DockerfileConfig::default();

        assert!(ensure_dockerfile(&dir, &config, "my-app").unwrap());
        let written = fs::read_to_string(dir.join(DOCKERFILE)).unwrap();
        assert!(written.contains("cargo build --release --bin my_app"));
        assert!(written.contains("/target/release/my_app "));
        assert!(written.contains(r#"CMD ["app", "serve"]"#));

        assert!(!ensure_dockerfile(&dir, &config, "my-app").unwrap());
    }

    #[test]
    fn configured_binary_wins_over_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("my_app");
        fs::create_dir(&dir).unwrap();
        let config = DockerfileConfig {
            binary: Some("server".to_string()),
            rust_version: None,
        };

        assert!(ensure_dockerfile(&dir, &config, "my-app").unwrap());
        let written = fs::read_to_string(dir.join(DOCKERFILE)).unwrap();
        assert!(written.contains("cargo build --release --bin server"));
    }

    #[test]
    fn procfile_suppresses_default_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PROCFILE, "web: app serve\n");

        assert!(!ensure_dockerfile(dir.path(), &DockerfileConfig::default(), "svc").unwrap());
        assert!(!dir.path().join(DOCKERFILE).exists());
    }

    #[test]
    fn dockerfile_honours_binary_and_toolchain() {
        let config = DockerfileConfig {
            binary: Some("server".to_string()),
            rust_version: Some("1.85".to_string()),
        };
        let rendered = default_dockerfile(&config, "svc");
        assert!(rendered.starts_with("FROM rust:1.85 AS builder"));
        assert!(rendered.contains("/target/release/server "));
    }

    #[test]
    fn archive_is_sorted_and_excludes_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "Cargo.toml", "[package]");
        write(dir.path(), "target/release/app", "binary");
        write(dir.path(), ".git/HEAD", "ref");
        write(dir.path(), ".goblet/config.json", "{}");
        write(dir.path(), "data/big.bin", "xxxx");

        let archive = package_source(dir.path(), &["data/".to_string()]).unwrap();

        assert_eq!(entries(&archive), vec!["Cargo.toml", "src/main.rs"]);
        assert_eq!(archive.file_count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        std::os::unix::fs::symlink(
            dir.path().join("src/main.rs"),
            dir.path().join("src/link.rs"),
        )
        .unwrap();

        let archive = package_source(dir.path(), &[]).unwrap();

        assert_eq!(entries(&archive), vec!["src/main.rs"]);
    }

    #[test]
    fn identical_trees_produce_identical_archives() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [&a, &b] {
            write(dir.path(), "Dockerfile", "FROM scratch");
            write(dir.path(), "src/lib.rs", "pub fn f() {}");
        }

        let first = package_source(a.path(), &[]).unwrap();
        let second = package_source(b.path(), &[]).unwrap();

        assert_eq!(first.bytes(), second.bytes());
        assert_eq!(first.sha256(), second.sha256());
        assert_eq!(first.object_name("svc"), second.object_name("svc"));
    }

    #[test]
    fn object_name_uses_digest_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Dockerfile", "FROM scratch");

        let archive = package_source(dir.path(), &[]).unwrap();
        let name = archive.object_name("svc");

        assert!(name.starts_with("goblet/svc/source-"));
        assert!(name.ends_with(".tar.gz"));
        assert_eq!(name, format!("goblet/svc/source-{}.tar.gz", &archive.sha256()[..12]));
    }
}
