//! Repository trait definitions for hardware persistence.
//!
//! Storage is split into focused traits:
//!
//! - [`error`]: error types for repository operations
//! - [`HealthRepository`]: connectivity checks
//! - [`EntityRepository`]: create/read/update/delete for one entity type
//!
//! # Trait Composition
//!
//! A complete backend implements [`EntityRepository`] once per hardware
//! entity. [`FullRepository`] is implemented automatically for any such
//! type and is what the HTTP layer holds (`Arc<dyn FullRepository>`).
//!
//! Because one object implements `EntityRepository<E>` many times over,
//! generic code reaches the right implementation through [`Stored::store`]:
//!
//! ```ignore
//! async fn count<E: Stored>(repo: &dyn FullRepository) -> RepositoryResult<usize> {
//!     Ok(E::store(repo).list().await?.len())
//! }
//! ```
//!
//! # Write semantics
//!
//! Every write is atomic: field validation, uniqueness, foreign-key
//! existence, join-table updates and cascade/protect rules either all apply
//! or nothing is persisted. Each successful write sets `modified` to a value
//! strictly later than the row's previous one.

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use async_trait::async_trait;

use crate::models::{
    Camera, CameraType, Enclosure, Entity, GenericMode, GenericModeGroup, Instrument,
    InstrumentType, ModeType, OpticalElement, OpticalElementGroup, Site, Telescope,
};

/// Connectivity checks.
#[async_trait]
pub trait HealthRepository: Send + Sync {
    /// Check if the store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;
}

/// CRUD operations for one entity type.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait EntityRepository<E: Entity>: Send + Sync {
    /// Validate and insert a new row.
    ///
    /// # Returns
    /// * `Ok(E)` - The stored entity with its assigned id and timestamp
    /// * `Err(RepositoryError::ValidationError)` - Invalid fields, duplicate
    ///   unique value, or unknown foreign key
    async fn create(&self, fields: E::Fields) -> RepositoryResult<E>;

    /// Fetch one row.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no row has this id
    async fn get(&self, id: &E::Id) -> RepositoryResult<E>;

    /// All rows in the entity's natural listing order.
    async fn list(&self) -> RepositoryResult<Vec<E>>;

    /// Replace every writable field of an existing row.
    async fn update(&self, id: &E::Id, fields: E::Fields) -> RepositoryResult<E>;

    /// Delete a row, cascading to owned rows.
    ///
    /// # Returns
    /// * `Err(RepositoryError::IntegrityError)` - If a protected reference
    ///   to the row exists; nothing is deleted
    /// * `Err(RepositoryError::NotFound)` - If no row has this id
    async fn delete(&self, id: &E::Id) -> RepositoryResult<()>;
}

/// Composite trait for a complete hardware repository.
///
/// Implemented automatically for any type that implements
/// [`HealthRepository`] and [`EntityRepository`] for every entity.
pub trait FullRepository:
    HealthRepository
    + EntityRepository<Site>
    + EntityRepository<Enclosure>
    + EntityRepository<Telescope>
    + EntityRepository<OpticalElement>
    + EntityRepository<OpticalElementGroup>
    + EntityRepository<CameraType>
    + EntityRepository<Camera>
    + EntityRepository<InstrumentType>
    + EntityRepository<ModeType>
    + EntityRepository<GenericMode>
    + EntityRepository<GenericModeGroup>
    + EntityRepository<Instrument>
{
    fn sites(&self) -> &dyn EntityRepository<Site>;
    fn enclosures(&self) -> &dyn EntityRepository<Enclosure>;
    fn telescopes(&self) -> &dyn EntityRepository<Telescope>;
    fn optical_elements(&self) -> &dyn EntityRepository<OpticalElement>;
    fn optical_element_groups(&self) -> &dyn EntityRepository<OpticalElementGroup>;
    fn camera_types(&self) -> &dyn EntityRepository<CameraType>;
    fn cameras(&self) -> &dyn EntityRepository<Camera>;
    fn instrument_types(&self) -> &dyn EntityRepository<InstrumentType>;
    fn mode_types(&self) -> &dyn EntityRepository<ModeType>;
    fn generic_modes(&self) -> &dyn EntityRepository<GenericMode>;
    fn generic_mode_groups(&self) -> &dyn EntityRepository<GenericModeGroup>;
    fn instruments(&self) -> &dyn EntityRepository<Instrument>;
}

impl<T> FullRepository for T
where
    T: HealthRepository
        + EntityRepository<Site>
        + EntityRepository<Enclosure>
        + EntityRepository<Telescope>
        + EntityRepository<OpticalElement>
        + EntityRepository<OpticalElementGroup>
        + EntityRepository<CameraType>
        + EntityRepository<Camera>
        + EntityRepository<InstrumentType>
        + EntityRepository<ModeType>
        + EntityRepository<GenericMode>
        + EntityRepository<GenericModeGroup>
        + EntityRepository<Instrument>,
{
    fn sites(&self) -> &dyn EntityRepository<Site> {
        self
    }
    fn enclosures(&self) -> &dyn EntityRepository<Enclosure> {
        self
    }
    fn telescopes(&self) -> &dyn EntityRepository<Telescope> {
        self
    }
    fn optical_elements(&self) -> &dyn EntityRepository<OpticalElement> {
        self
    }
    fn optical_element_groups(&self) -> &dyn EntityRepository<OpticalElementGroup> {
        self
    }
    fn camera_types(&self) -> &dyn EntityRepository<CameraType> {
        self
    }
    fn cameras(&self) -> &dyn EntityRepository<Camera> {
        self
    }
    fn instrument_types(&self) -> &dyn EntityRepository<InstrumentType> {
        self
    }
    fn mode_types(&self) -> &dyn EntityRepository<ModeType> {
        self
    }
    fn generic_modes(&self) -> &dyn EntityRepository<GenericMode> {
        self
    }
    fn generic_mode_groups(&self) -> &dyn EntityRepository<GenericModeGroup> {
        self
    }
    fn instruments(&self) -> &dyn EntityRepository<Instrument> {
        self
    }
}

/// An entity persisted by every [`FullRepository`].
pub trait Stored: Entity {
    fn store(repo: &dyn FullRepository) -> &dyn EntityRepository<Self>;
}

macro_rules! impl_stored {
    ($($entity:ty => $accessor:ident),* $(,)?) => {
        $(
            impl Stored for $entity {
                fn store(repo: &dyn FullRepository) -> &dyn EntityRepository<Self> {
                    repo.$accessor()
                }
            }
        )*
    };
}

impl_stored! {
    Site => sites,
    Enclosure => enclosures,
    Telescope => telescopes,
    OpticalElement => optical_elements,
    OpticalElementGroup => optical_element_groups,
    CameraType => camera_types,
    Camera => cameras,
    InstrumentType => instrument_types,
    ModeType => mode_types,
    GenericMode => generic_modes,
    GenericModeGroup => generic_mode_groups,
    Instrument => instruments,
}
