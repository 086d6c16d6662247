//! Plugin registration and factory entry points
//!
//! The host loads erasure-code plugins by name and drives three entry
//! points: a version probe, an init hook that registers a factory with the
//! process-wide registry, and the factory itself, which instantiates a
//! codec for a profile. The factory here dispatches on the profile's
//! `technique` key, so the sizeceph codec and its XOR sibling share one
//! plugin surface.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Error, Result};
use crate::interface::ErasureCodeInterface;
use crate::profile::ErasureCodeProfile;
use crate::simple_xor::SimpleXorCodec;
use crate::sizeceph::SizeCephCodec;

/// A registered codec factory.
pub trait ErasureCodePlugin: Send + Sync {
    /// Instantiate a codec for `profile` and initialize it. An instance
    /// whose init fails is destroyed and the error propagated.
    fn factory(
        &self,
        directory: &str,
        profile: &ErasureCodeProfile,
    ) -> Result<Box<dyn ErasureCodeInterface + Send + Sync>>;
}

/// Process-wide name-to-factory table.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn ErasureCodePlugin>>,
}

static REGISTRY: Lazy<Mutex<PluginRegistry>> = Lazy::new(|| Mutex::new(PluginRegistry::default()));

impl PluginRegistry {
    /// The process-wide registry instance.
    pub fn global() -> &'static Mutex<PluginRegistry> {
        &REGISTRY
    }

    /// Register a factory under `name`; a duplicate name is refused.
    pub fn add(&mut self, name: &str, plugin: Box<dyn ErasureCodePlugin>) -> Result<()> {
        if self.plugins.contains_key(name) {
            return Err(Error::PluginExists(name.to_string()));
        }
        self.plugins.insert(name.to_string(), plugin);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Instantiate a codec through the factory registered under `name`.
    pub fn factory(
        &self,
        name: &str,
        directory: &str,
        profile: &ErasureCodeProfile,
    ) -> Result<Box<dyn ErasureCodeInterface + Send + Sync>> {
        let plugin = self
            .plugins
            .get(name)
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))?;
        plugin.factory(directory, profile)
    }
}

// =============================================================================
// SizeCeph Plugin Factory
// =============================================================================

/// Factory for the codecs this plugin ships, dispatching on `technique`.
#[derive(Debug, Default)]
pub struct SizeCephPluginFactory;

impl ErasureCodePlugin for SizeCephPluginFactory {
    fn factory(
        &self,
        directory: &str,
        profile: &ErasureCodeProfile,
    ) -> Result<Box<dyn ErasureCodeInterface + Send + Sync>> {
        let technique = profile.get("technique").unwrap_or("sizeceph");
        debug!(directory, technique, "instantiating codec");

        match technique {
            "sizeceph" => {
                let mut codec = SizeCephCodec::new();
                codec.init(profile)?;
                Ok(Box::new(codec))
            }
            "simple_xor" => {
                let mut codec = SimpleXorCodec::new();
                codec.init(profile)?;
                Ok(Box::new(codec))
            }
            other => Err(Error::InvalidProfile(format!(
                "unknown technique '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Host Entry Points
// =============================================================================

/// Build version string reported to the host at plugin load.
pub fn plugin_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Register this plugin's factory under `name`. Called by the host once per
/// plugin load; a second registration under the same name fails.
pub fn plugin_init(name: &str, directory: &str) -> Result<()> {
    let mut registry = PluginRegistry::global()
        .lock()
        .map_err(|_| Error::InvalidArgument("plugin registry poisoned".to_string()))?;
    registry.add(name, Box::new(SizeCephPluginFactory))?;
    debug!(name, directory, "sizeceph plugin registered");
    Ok(())
}
