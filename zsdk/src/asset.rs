use crate::release::{Asset, Release};
use crate::{Compression, Packaging, Strategy};
use anyhow::Result;

/// Facts about an asset inferred from its file name.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Traits {
    pub linux: bool,
    pub x86_64: bool,
    pub minimal: bool,
    pub hosttools: bool,
    pub setup: bool,
    pub packaging: Option<Packaging>,
}

impl Traits {
    pub fn parse(name: &str) -> Self {
        let name = name.to_lowercase();
        Self {
            linux: name.contains("linux"),
            x86_64: name.contains("x86_64"),
            minimal: name.contains("minimal"),
            hosttools: name.contains("hosttools"),
            setup: name.contains("setup"),
            packaging: Packaging::from_file_name(&name),
        }
    }
}

impl Asset {
    pub fn traits(&self) -> Traits {
        Traits::parse(&self.name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Rule {
    packaging: Packaging,
    require_setup: bool,
    prefer_full: bool,
}

impl Rule {
    pub fn installer() -> Self {
        Self {
            packaging: Packaging::Installer,
            require_setup: false,
            prefer_full: false,
        }
    }

    pub fn tarball(compression: Compression) -> Self {
        Self {
            packaging: Packaging::Tarball(compression),
            require_setup: false,
            prefer_full: true,
        }
    }

    /// Only accept names carrying a `setup` marker.
    pub fn require_setup(mut self) -> Self {
        self.require_setup = true;
        self
    }

    pub fn packaging(&self) -> Packaging {
        self.packaging
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        let traits = asset.traits();
        if traits.packaging != Some(self.packaging) || !traits.linux || !traits.x86_64 {
            return false;
        }
        if self.require_setup && !traits.setup {
            return false;
        }
        match self.packaging {
            Packaging::Installer => !traits.hosttools,
            Packaging::Tarball(_) => true,
        }
    }

    /// First match in list order, or with `prefer_full` the first match
    /// without a `minimal` marker before any minimal one.
    pub fn pick<'a>(&self, assets: &'a [Asset]) -> Option<&'a Asset> {
        let mut matching = assets.iter().filter(|asset| self.matches(asset));
        if !self.prefer_full {
            return matching.next();
        }
        let mut fallback = None;
        for asset in matching {
            if !asset.traits().minimal {
                return Some(asset);
            }
            fallback.get_or_insert(asset);
        }
        fallback
    }
}

impl Strategy {
    pub fn rules(self) -> Vec<Rule> {
        match self {
            Self::Installer => vec![Rule::installer().require_setup()],
            Self::Fallback => vec![
                Rule::installer(),
                Rule::tarball(Compression::Xz),
                Rule::tarball(Compression::Zstd),
            ],
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selection {
    pub asset: Asset,
    pub packaging: Packaging,
}

/// Evaluates `rules` in order; the first rule with a match wins.
pub fn select(release: &Release, rules: &[Rule]) -> Result<Selection> {
    let assets = release.assets();
    for rule in rules {
        if let Some(asset) = rule.pick(assets) {
            tracing::debug!("selected {} as {}", asset.name, rule.packaging());
            return Ok(Selection {
                asset: asset.clone(),
                packaging: rule.packaging(),
            });
        }
    }
    let available = if assets.is_empty() {
        "<no assets>".to_string()
    } else {
        assets
            .iter()
            .map(|asset| asset.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    anyhow::bail!(
        "no matching asset in release {}; available assets: {}",
        release.tag_name,
        available
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(names: &[&str]) -> Release {
        let assets = names
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "browser_download_url": format!("https://dl/{}", name),
                })
            })
            .collect::<Vec<_>>();
        serde_json::from_value(serde_json::json!({ "tag_name": "v0.17.0", "assets": assets }))
            .unwrap()
    }

    fn pick(names: &[&str], strategy: Strategy) -> Result<Selection> {
        select(&release(names), &strategy.rules())
    }

    #[test]
    fn traits() {
        let traits = Traits::parse("zephyr-sdk-0.17.0_Linux-X86_64_minimal.tar.xz");
        assert!(traits.linux && traits.x86_64 && traits.minimal);
        assert!(!traits.hosttools && !traits.setup);
        assert_eq!(traits.packaging, Some(Packaging::Tarball(Compression::Xz)));
        assert_eq!(Traits::parse("sha256.sum").packaging, None);
    }

    #[test]
    fn installer_beats_tarball() {
        let selection = pick(
            &[
                "zephyr-sdk-0.17.0_linux-x86_64.tar.xz",
                "zephyr-sdk-0.17.0_linux-x86_64_setup.run",
            ],
            Strategy::Fallback,
        )
        .unwrap();
        assert_eq!(selection.packaging, Packaging::Installer);
        assert_eq!(selection.asset.name, "zephyr-sdk-0.17.0_linux-x86_64_setup.run");
    }

    #[test]
    fn installer_skips_hosttools_and_other_hosts() {
        let selection = pick(
            &[
                "hosttools_linux-x86_64.run",
                "zephyr-sdk-0.16.0_linux-aarch64_setup.run",
                "zephyr-sdk-0.16.0_macos-x86_64_setup.run",
                "zephyr-sdk-0.16.0_LINUX-x86_64_setup.run",
                "zephyr-sdk-0.16.0_linux-x86_64_other.run",
            ],
            Strategy::Fallback,
        )
        .unwrap();
        assert_eq!(selection.asset.name, "zephyr-sdk-0.16.0_LINUX-x86_64_setup.run");
    }

    #[test]
    fn installer_strategy_requires_setup() {
        let err = pick(
            &[
                "zephyr-sdk-0.16.0_linux-x86_64.run",
                "zephyr-sdk-0.16.0_linux-x86_64.tar.xz",
            ],
            Strategy::Installer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("zephyr-sdk-0.16.0_linux-x86_64.run"));
        let selection = pick(&["zephyr-sdk-0.16.0_linux-x86_64.run"], Strategy::Fallback).unwrap();
        assert_eq!(selection.packaging, Packaging::Installer);
    }

    #[test]
    fn tarball_prefers_full() {
        let selection = pick(
            &[
                "zephyr-sdk-0.17.0_linux-x86_64_minimal.tar.xz",
                "zephyr-sdk-0.17.0_macos-x86_64.tar.xz",
                "zephyr-sdk-0.17.0_linux-x86_64.tar.xz",
                "zephyr-sdk-0.17.0_linux-x86_64_full.tar.xz",
            ],
            Strategy::Fallback,
        )
        .unwrap();
        assert_eq!(selection.packaging, Packaging::Tarball(Compression::Xz));
        assert_eq!(selection.asset.name, "zephyr-sdk-0.17.0_linux-x86_64.tar.xz");
    }

    #[test]
    fn tarball_takes_minimal_when_alone() {
        let selection = pick(
            &[
                "zephyr-sdk-0.17.0_linux-x86_64_minimal.tar.xz",
                "zephyr-sdk-0.17.0_linux-aarch64.tar.xz",
            ],
            Strategy::Fallback,
        )
        .unwrap();
        assert_eq!(
            selection.asset.name,
            "zephyr-sdk-0.17.0_linux-x86_64_minimal.tar.xz"
        );
    }

    #[test]
    fn zstd_tarball_after_xz() {
        let selection = pick(&["zephyr-sdk-1.0_linux-x86_64.tar.zst"], Strategy::Fallback).unwrap();
        assert_eq!(selection.packaging, Packaging::Tarball(Compression::Zstd));
        let selection = pick(
            &[
                "zephyr-sdk-1.0_linux-x86_64.tar.zst",
                "zephyr-sdk-1.0_linux-x86_64_minimal.tar.xz",
            ],
            Strategy::Fallback,
        )
        .unwrap();
        assert_eq!(selection.packaging, Packaging::Tarball(Compression::Xz));
        assert!(pick(&["zephyr-sdk-1.0_linux-x86_64.tar.zst"], Strategy::Installer).is_err());
    }

    #[test]
    fn empty_assets() {
        let err = pick(&[], Strategy::Fallback).unwrap_err();
        assert!(err.to_string().contains("<no assets>"), "{}", err);
        let release: Release = serde_json::from_str(r#"{"tag_name": "v1", "assets": null}"#).unwrap();
        let err = select(&release, &Strategy::Fallback.rules()).unwrap_err();
        assert!(err.to_string().contains("<no assets>"), "{}", err);
    }

    #[test]
    fn no_match_lists_assets() {
        let err = pick(&["sha256.sum", "toolchain_windows-x86_64.7z"], Strategy::Fallback)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no matching asset in release v0.17.0; available assets: sha256.sum, toolchain_windows-x86_64.7z"
        );
    }
}
