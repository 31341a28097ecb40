use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub trait Download {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct DownloadManager {
    client: Client,
    download_dir: PathBuf,
    progress: bool,
}

impl Download for DownloadManager {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let target = if self.progress {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:.bold} [{elapsed}] {wide_bar:.green} {bytes}/{total_bytes} {msg}")?
                .progress_chars("█▇▆▅▄▃▂▁  ")
        );
        let file_name = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_prefix(file_name);
        pb.set_message("📥 downloading");

        let mut resp = self.client.get(url).send()?;
        anyhow::ensure!(
            resp.status().is_success(),
            "GET {} returned status code {}",
            url,
            resp.status()
        );
        let len = resp.content_length().unwrap_or_default();
        pb.set_length(len);

        let mut dest = pb.wrap_write(BufWriter::new(File::create(dest)?));
        std::io::copy(&mut resp, &mut dest)?;
        dest.flush()?;
        pb.finish_with_message("📥 downloaded");

        Ok(())
    }
}

impl DownloadManager {
    pub fn new(client: Client, download_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(download_dir)?;
        Ok(Self {
            client,
            download_dir: download_dir.to_path_buf(),
            progress: true,
        })
    }

    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Saves `url` as `name` in the download directory and returns its path.
    pub fn fetch(&self, url: &str, name: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !name.is_empty() && !name.contains('/') && name != "." && name != "..",
            "refusing to save asset under name {:?}",
            name
        );
        let dest = self.download_dir.join(name);
        tracing::info!("downloading {} to {}", url, dest.display());
        let result = self.download(url, &dest);
        if result.is_err() {
            std::fs::remove_file(&dest).ok();
        }
        result?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_streams_raw_bytes() {
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/sdk.tar.xz")
            .with_status(200)
            .with_body(&body)
            .create();
        let dir = tempfile::tempdir().unwrap();
        let manager = DownloadManager::new(Client::new(), dir.path()).unwrap().quiet();
        let path = manager
            .fetch(&format!("{}/sdk.tar.xz", server.url()), "sdk.tar.xz")
            .unwrap();
        assert_eq!(path, dir.path().join("sdk.tar.xz"));
        assert_eq!(std::fs::read(path).unwrap(), body);
    }

    #[test]
    fn fetch_fails_on_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/gone.run").with_status(410).create();
        let dir = tempfile::tempdir().unwrap();
        let manager = DownloadManager::new(Client::new(), dir.path()).unwrap().quiet();
        let url = format!("{}/gone.run", server.url());
        let err = manager.fetch(&url, "gone.run").unwrap_err();
        assert!(err.to_string().contains(&url), "{}", err);
        assert!(!dir.path().join("gone.run").exists());
    }

    #[test]
    fn fetch_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DownloadManager::new(Client::new(), dir.path()).unwrap().quiet();
        assert!(manager.fetch("http://127.0.0.1:1/x", "../x").is_err());
    }
}
