// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage loader: verified registry first, stage container second.

use log::{info, warn};

use crate::config::{BootConfig, Fallback, StageSpec};
use crate::error::LoadError;
use crate::media::{BootMedia, Region};
use crate::registry::ComponentRegistry;

/// Where a loaded image came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StageSource {
    /// Loaded from a record in the verified registry.
    Verified { address: u32, size: u32 },
    /// Loaded from the stage container by name, without verification.
    Container,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadedStage {
    pub entry: u64,
    pub source: StageSource,
}

/// Loads `stage` and returns its entry point.
///
/// With verified boot enabled, the registry record for `stage.index` is tried
/// first. A missing registry, a zero-size record and a record whose load fails
/// all mean the same thing: nothing verified to boot. The container path is
/// then taken, unless the stage forbids it.
pub fn load_stage(
    config: &BootConfig,
    registry: &ComponentRegistry,
    media: &mut dyn BootMedia,
    stage: &StageSpec,
) -> Result<LoadedStage, LoadError> {
    if config.verified_boot {
        if let Some(loaded) = load_verified(registry, media, stage) {
            return Ok(loaded);
        }
        if stage.fallback == Fallback::Forbidden {
            return Err(LoadError::VerificationRequired(stage.name));
        }
    }

    match media.load_stage(stage.name) {
        Ok(entry) => {
            info!("Loaded {} from container to EP {:#x}", stage.name, entry);
            Ok(LoadedStage {
                entry,
                source: StageSource::Container,
            })
        }
        Err(e) => {
            warn!("{} failed to load from container: {}", stage.name, e);
            Err(LoadError::NotFound(stage.name))
        }
    }
}

fn load_verified(
    registry: &ComponentRegistry,
    media: &mut dyn BootMedia,
    stage: &StageSpec,
) -> Option<LoadedStage> {
    let component = registry.verified(stage.index)?;

    match media.load_stage_by_offset(component.address) {
        Ok(entry) => {
            info!(
                "Loaded {} bytes verified {} from {:#010x} to EP {:#x}",
                component.size, stage.name, component.address, entry
            );
            Some(LoadedStage {
                entry,
                source: StageSource::Verified {
                    address: component.address,
                    size: component.size,
                },
            })
        }
        Err(e) => {
            // A half-loaded verified image is no better than none at all.
            warn!("verified {} at {:#010x} failed to load: {}", stage.name, component.address, e);
            None
        }
    }
}

/// Finds the bytes of an image that is copied rather than stage-loaded.
pub fn locate_raw(
    config: &BootConfig,
    registry: &ComponentRegistry,
    media: &dyn BootMedia,
    stage: &StageSpec,
) -> Result<Region, LoadError> {
    if config.verified_boot {
        if let Some(component) = registry.verified(stage.index) {
            return Ok(Region::new(component.address, component.size));
        }
        if stage.fallback == Fallback::Forbidden {
            return Err(LoadError::VerificationRequired(stage.name));
        }
    }

    info!("Looking for {}", stage.name);
    media.locate_file(stage.name).map_err(|e| {
        warn!("{} not located in container: {}", stage.name, e);
        LoadError::NotFound(stage.name)
    })
}

/// Copies `region` into `dest`, which must be exactly `region.len` long.
pub fn read_raw(
    media: &mut dyn BootMedia,
    region: Region,
    dest: &mut [u8],
) -> Result<(), LoadError> {
    let expected = region.len as usize;
    let actual = media.read(&mut dest[..expected], region.offset);
    if actual != expected {
        return Err(LoadError::ShortRead { expected, actual });
    }
    Ok(())
}
