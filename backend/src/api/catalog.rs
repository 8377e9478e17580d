//! In-memory snapshot of every hardware table, used to assemble nested views.

use std::collections::HashMap;

use crate::db::repository::{FullRepository, RepositoryResult};
use crate::models::{
    Camera, CameraType, Enclosure, Entity, GenericMode, GenericModeGroup, Instrument,
    InstrumentType, ModeType, OpticalElement, OpticalElementGroup, Site, Telescope,
};

/// Rows of one table in listing order, indexed by id.
#[derive(Debug, Clone)]
pub struct Rows<E: Entity> {
    rows: Vec<E>,
    index: HashMap<E::Id, usize>,
}

impl<E: Entity> Rows<E> {
    pub fn new(rows: Vec<E>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.id().clone(), pos))
            .collect();
        Self { rows, index }
    }

    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.index.get(id).map(|&pos| &self.rows[pos])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a list of ids, skipping any that are not present.
    pub fn resolve<'a>(&'a self, ids: &'a [E::Id]) -> impl Iterator<Item = &'a E> + 'a {
        ids.iter().filter_map(move |id| self.get(id))
    }
}

impl<E: Entity> Default for Rows<E> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Every table, read concurrently from the repository.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub sites: Rows<Site>,
    pub enclosures: Rows<Enclosure>,
    pub telescopes: Rows<Telescope>,
    pub optical_elements: Rows<OpticalElement>,
    pub optical_element_groups: Rows<OpticalElementGroup>,
    pub camera_types: Rows<CameraType>,
    pub cameras: Rows<Camera>,
    pub instrument_types: Rows<InstrumentType>,
    pub mode_types: Rows<ModeType>,
    pub generic_modes: Rows<GenericMode>,
    pub generic_mode_groups: Rows<GenericModeGroup>,
    pub instruments: Rows<Instrument>,
}

impl Catalog {
    pub async fn load(repo: &dyn FullRepository) -> RepositoryResult<Self> {
        let (
            sites,
            enclosures,
            telescopes,
            optical_elements,
            optical_element_groups,
            camera_types,
            cameras,
            instrument_types,
            mode_types,
            generic_modes,
            generic_mode_groups,
            instruments,
        ) = tokio::try_join!(
            repo.sites().list(),
            repo.enclosures().list(),
            repo.telescopes().list(),
            repo.optical_elements().list(),
            repo.optical_element_groups().list(),
            repo.camera_types().list(),
            repo.cameras().list(),
            repo.instrument_types().list(),
            repo.mode_types().list(),
            repo.generic_modes().list(),
            repo.generic_mode_groups().list(),
            repo.instruments().list(),
        )?;

        log::debug!(
            "Loaded catalog: {} sites, {} telescopes, {} instruments, {} cameras",
            sites.len(),
            telescopes.len(),
            instruments.len(),
            cameras.len()
        );

        Ok(Self {
            sites: Rows::new(sites),
            enclosures: Rows::new(enclosures),
            telescopes: Rows::new(telescopes),
            optical_elements: Rows::new(optical_elements),
            optical_element_groups: Rows::new(optical_element_groups),
            camera_types: Rows::new(camera_types),
            cameras: Rows::new(cameras),
            instrument_types: Rows::new(instrument_types),
            mode_types: Rows::new(mode_types),
            generic_modes: Rows::new(generic_modes),
            generic_mode_groups: Rows::new(generic_mode_groups),
            instruments: Rows::new(instruments),
        })
    }
}
