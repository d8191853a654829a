//! 環境アーカイブ（tar.gz）の作成

use crate::error::{DeployError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;
use tar::Builder;

/// `input_dir` の中身をアーカイブのルートに置いた tar.gz を作成
pub fn create_tar_gz(output: &Path, input_dir: &Path) -> Result<u64> {
    tracing::debug!(
        output = %output.display(),
        input = %input_dir.display(),
        "Creating environment archive"
    );

    let archive_error = |e: std::io::Error| DeployError::Archive {
        path: output.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(archive_error)?;
    }

    let file = File::create(output).map_err(archive_error)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = Builder::new(encoder);
    tar.follow_symlinks(false);

    tar.append_dir_all(".", input_dir).map_err(archive_error)?;
    let encoder = tar.into_inner().map_err(archive_error)?;
    let file = encoder.finish().map_err(archive_error)?;

    let size = file.metadata().map_err(archive_error)?.len();
    tracing::debug!(bytes = size, "Environment archive created");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_create_tar_gz_preserves_structure() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("docker-compose.yml"), "services: {}").unwrap();
        fs::create_dir_all(source.path().join("nginx/sites-enabled")).unwrap();
        fs::write(source.path().join("nginx/sites-enabled/default"), "server {}").unwrap();

        let out_dir = tempdir().unwrap();
        let archive = out_dir.path().join("archives/project.dist.tar.gz");
        let size = create_tar_gz(&archive, source.path()).unwrap();
        assert!(size > 0);

        // tarアーカイブとして展開できるか確認
        let extract_dir = tempdir().unwrap();
        let decoder = flate2::read::GzDecoder::new(File::open(&archive).unwrap());
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(extract_dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(extract_dir.path().join("docker-compose.yml")).unwrap(),
            "services: {}"
        );
        assert_eq!(
            fs::read_to_string(extract_dir.path().join("nginx/sites-enabled/default")).unwrap(),
            "server {}"
        );
    }

    #[test]
    fn test_create_tar_gz_missing_input() {
        let out_dir = tempdir().unwrap();
        let result = create_tar_gz(
            &out_dir.path().join("a.tar.gz"),
            &out_dir.path().join("does-not-exist"),
        );
        assert!(matches!(result, Err(DeployError::Archive { .. })));
    }
}
