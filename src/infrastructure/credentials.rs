// Password loading for the device handshake
use std::path::Path;

use anyhow::Context;

use crate::application::ports::CredentialSource;

/// First line of a local file, read once at startup and used verbatim.
pub struct FilePasswordSource {
    password: String,
}

impl FilePasswordSource {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading password file {}", path.display()))?;
        let password = contents.lines().next().unwrap_or_default().to_string();
        if password.is_empty() {
            anyhow::bail!("password file {} is empty", path.display());
        }
        Ok(Self { password })
    }
}

impl CredentialSource for FilePasswordSource {
    fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_uses_first_line_only() {
        let path = temp_file("pw-first-line", "s3cret\nignored trailer\n");
        let source = FilePasswordSource::load(&path).unwrap();
        assert_eq!(source.password(), "s3cret");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let path = temp_file("pw-empty", "");
        assert!(FilePasswordSource::load(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(FilePasswordSource::load("/nonexistent/pw").is_err());
    }
}
