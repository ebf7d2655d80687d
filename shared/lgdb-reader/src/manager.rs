use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::container::ContainerFile;
use crate::error::Result;
use crate::world::{decode_world_geometry_with, DecodeOptions, WorldGeometry};

/// A container together with its decoded world geometry. Immutable once built.
#[derive(Debug)]
pub struct LoadedWorld {
    container: ContainerFile,
    geometry: WorldGeometry,
}

impl LoadedWorld {
    pub fn container(&self) -> &ContainerFile {
        &self.container
    }

    pub fn geometry(&self) -> &WorldGeometry {
        &self.geometry
    }
}

/// Holds the currently loaded world. A load replaces it only after the new file has been fully
/// decoded, so readers never see a partial world and a failed load leaves the old one in place.
#[derive(Debug, Default)]
pub struct WorldSlot {
    current: Option<Arc<LoadedWorld>>,
}

impl WorldSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<LoadedWorld>> {
        self.load_with(path, &DecodeOptions::default())
    }

    pub fn load_with<P: AsRef<Path>>(
        &mut self,
        path: P,
        options: &DecodeOptions,
    ) -> Result<Arc<LoadedWorld>> {
        let path = path.as_ref();
        let start = Instant::now();

        let world = ContainerFile::open(path).and_then(|container| {
            let opened = Instant::now();
            info!("opened {} in {:?}", path.display(), opened - start);

            let geometry = decode_world_geometry_with(&container, options)?;
            info!(
                "decoded {} cells of {} in {:?}",
                geometry.cells().len(),
                geometry.chunk_name(),
                opened.elapsed(),
            );
            Ok(LoadedWorld {
                container,
                geometry,
            })
        });

        match world {
            Ok(world) => {
                let world = Arc::new(world);
                self.current = Some(Arc::clone(&world));
                info!("loaded {} in {:?}", path.display(), start.elapsed());
                Ok(world)
            }
            Err(err) => {
                warn!("failed to load {}: {}", path.display(), err);
                Err(err)
            }
        }
    }

    pub fn current(&self) -> Option<Arc<LoadedWorld>> {
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
