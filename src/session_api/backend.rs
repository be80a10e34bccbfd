use crate::config::ClientConfig;

/// Tells the client which backend to talk to
///
/// Consulted on every call, so a change of build mode is picked up
/// without rebuilding the client.
pub trait BackendLocator: Send + Sync {
    /// `true` for packaged (production) builds
    fn is_packaged_build(&self) -> bool;
}

/// Build mode of the running app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Packaged,
    Development,
}

impl BuildMode {
    /// Mode of the current binary: release builds count as packaged
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Packaged
        }
    }
}

impl BackendLocator for BuildMode {
    fn is_packaged_build(&self) -> bool {
        matches!(self, BuildMode::Packaged)
    }
}

/// Pick the base URL for the current build mode, without a trailing slash
pub(crate) fn resolve_base_url<'a>(locator: &dyn BackendLocator, config: &'a ClientConfig) -> &'a str {
    let url = if locator.is_packaged_build() {
        &config.production_base_url
    } else {
        &config.development_base_url
    };
    url.trim_end_matches('/')
}
