use crate::asset::Selection;
use crate::download::DownloadManager;
use crate::release::ReleaseResolver;
use crate::task::TaskRunner;
use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};

pub mod asset;
pub mod ci;
pub mod download;
pub mod install;
pub mod release;
mod task;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    Xz,
    Zstd,
}

impl Compression {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xz => ".tar.xz",
            Self::Zstd => ".tar.zst",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Xz => write!(f, "xz"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Packaging {
    /// Self-extracting `.run` installer.
    Installer,
    Tarball(Compression),
}

impl Packaging {
    /// Expects a lower-cased file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".run") {
            return Some(Self::Installer);
        }
        [Compression::Xz, Compression::Zstd]
            .into_iter()
            .find(|compression| name.ends_with(compression.extension()))
            .map(Self::Tarball)
    }
}

impl std::fmt::Display for Packaging {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Installer => write!(f, "installer"),
            Self::Tarball(compression) => write!(f, "tarball ({})", compression),
        }
    }
}

/// Which asset kinds a run accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// Only `*setup*.run` installers.
    Installer,
    /// Installers first, then `.tar.xz`, then `.tar.zst` archives.
    Fallback,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Installer => write!(f, "installer"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(strategy: &str) -> Result<Self> {
        Ok(match strategy {
            "installer" => Self::Installer,
            "fallback" => Self::Fallback,
            _ => anyhow::bail!("unsupported strategy {}", strategy),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Selected,
    Downloading,
    InstallingViaScript,
    ExtractingArchive,
    Resolved,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Selected => write!(f, "selected"),
            Self::Downloading => write!(f, "downloading"),
            Self::InstallingViaScript => write!(f, "installing via script"),
            Self::ExtractingArchive => write!(f, "extracting archive"),
            Self::Resolved => write!(f, "resolved"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
pub struct InstallArgs {
    /// SDK version to install, with or without a leading `v`.
    /// Empty installs the latest release.
    #[clap(long, env = "ZEPHYR_SDK_VERSION")]
    sdk_version: Option<String>,
    /// Bearer token for the release api.
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Home directory. Archives are unpacked here.
    #[clap(long, env = "HOME")]
    home: Option<PathBuf>,
    /// CI environment file receiving the install directory.
    #[clap(long, env = "GITHUB_ENV")]
    github_env: Option<PathBuf>,
    /// Release api base url.
    #[clap(long, env = "ZSDK_API_URL", default_value = release::DEFAULT_API_URL)]
    api_url: String,
    /// Directory the asset is downloaded to.
    #[clap(long, env = "ZSDK_DOWNLOAD_DIR", default_value = ".")]
    download_dir: PathBuf,
    /// Target directory for installers. Defaults to `<home>/zephyr-sdk`.
    #[clap(long, env = "ZSDK_INSTALL_DIR")]
    install_dir: Option<PathBuf>,
    /// Key written to the CI environment file.
    #[clap(long, env = "ZSDK_ENV_KEY", default_value = ci::DEFAULT_ENV_KEY)]
    env_key: String,
    /// Accepted asset kinds. Can be one of `installer` or `fallback`.
    #[clap(long, env = "ZSDK_STRATEGY", default_value = "fallback")]
    strategy: Strategy,
    /// Use verbose output
    #[clap(long, short)]
    verbose: bool,
}

#[derive(Clone, Debug)]
pub struct SdkEnv {
    version: Option<String>,
    token: Option<String>,
    home: PathBuf,
    github_env: Option<PathBuf>,
    api_url: String,
    download_dir: PathBuf,
    install_dir: PathBuf,
    env_key: String,
    strategy: Strategy,
    verbose: bool,
}

impl SdkEnv {
    pub fn new(args: InstallArgs) -> Result<Self> {
        let home = match args.home.filter(|home| !home.as_os_str().is_empty()) {
            Some(home) => home,
            None => dirs::home_dir().context("could not determine the home directory")?,
        };
        let install_dir = args
            .install_dir
            .unwrap_or_else(|| home.join("zephyr-sdk"));
        Ok(Self {
            version: args
                .sdk_version
                .map(|version| release::bare_version(&version).to_string())
                .filter(|version| !version.is_empty()),
            token: args
                .token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            home,
            github_env: args
                .github_env
                .filter(|path| !path.as_os_str().is_empty()),
            api_url: args.api_url,
            download_dir: args.download_dir,
            install_dir,
            env_key: args.env_key,
            strategy: args.strategy,
            verbose: args.verbose,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn github_env(&self) -> Result<&Path> {
        self.github_env
            .as_deref()
            .context("GITHUB_ENV is not set; cannot record install directory")
    }

    pub fn resolver(&self) -> Result<ReleaseResolver> {
        ReleaseResolver::new(&self.api_url, self.token.as_deref())
    }

    fn download_manager(&self) -> Result<DownloadManager> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("zsdk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        DownloadManager::new(client, &self.download_dir)
    }
}

/// Resolves the release and picks an asset without downloading it.
pub fn show(env: &SdkEnv) -> Result<Selection> {
    let release = env.resolver()?.resolve(env.version())?;
    let selection = asset::select(&release, &env.strategy().rules())?;
    let rows = [
        ("release", release.tag_name.as_str()),
        ("asset", selection.asset.name.as_str()),
        ("url", selection.asset.browser_download_url.as_str()),
    ];
    for (key, value) in rows {
        println!("{} {}", style(format!("{:<8}", key)).bold(), value);
    }
    println!("{} {}", style(format!("{:<8}", "kind")).bold(), selection.packaging);
    Ok(selection)
}

/// Installs the selected SDK and records its directory in the CI
/// environment file. Returns the install directory.
pub fn install(env: &SdkEnv) -> Result<PathBuf> {
    let env_file = env.github_env()?;
    let mut runner = TaskRunner::new(4, env.verbose);

    runner.start_task("Resolving release");
    let release = env.resolver()?.resolve(env.version())?;
    runner.end_task();

    runner.start_task(format!("Selecting asset from {}", release.tag_name));
    let selection = asset::select(&release, &env.strategy().rules())?;
    runner.end_task();

    let mut stage = Stage::Selected;
    let dir = install_selection(env, &selection, &mut runner, &mut stage).with_context(|| {
        format!("{} {} while {}", selection.asset.name, Stage::Failed, stage)
    })?;
    tracing::info!("{} {} at {}", selection.asset.name, Stage::Resolved, dir.display());

    ci::append_env(env_file, &env.env_key, &dir)?;
    println!(
        "{} {}={}",
        style("[OK]").green(),
        env.env_key,
        dir.display()
    );
    Ok(dir)
}

fn install_selection(
    env: &SdkEnv,
    selection: &Selection,
    runner: &mut TaskRunner,
    stage: &mut Stage,
) -> Result<PathBuf> {
    *stage = Stage::Downloading;
    runner.start_task(format!("Downloading {}", selection.asset.name));
    let path = env
        .download_manager()?
        .fetch(&selection.asset.browser_download_url, &selection.asset.name)?;
    runner.end_verbose_task();

    let dir = match selection.packaging {
        Packaging::Installer => {
            *stage = Stage::InstallingViaScript;
            runner.start_task(format!("Installing into {}", env.install_dir.display()));
            install::run_installer(&path, &env.install_dir)?
        }
        Packaging::Tarball(compression) => {
            *stage = Stage::ExtractingArchive;
            runner.start_task(format!("Extracting into {}", env.home.display()));
            install::extract(&path, compression, &env.home, env.version())?
        }
    };
    runner.end_verbose_task();
    Ok(dir)
}
