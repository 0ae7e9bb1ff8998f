//! Data access for tours, users, reviews and bookings
//!
//! Each repository applies its default scope (secret tours and inactive users
//! are never returned), runs validation and derivation before persisting, and
//! enriches rows after loading. The generic handlers only see the
//! [`Resource`] capability.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::features::{FieldSpec, Retrieval};

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::BookingRepository;
pub use review::ReviewRepository;
pub use tour::TourRepository;
pub use user::UserRepository;

/// Create/read/update/delete/list over one resource type
#[async_trait]
pub trait Resource: Clone + Send + Sync + 'static {
    /// Serialized form returned to clients
    type Record: Serialize + Send + Sync;
    /// Create payload
    type Create: DeserializeOwned + Send + 'static;
    /// Partial update payload
    type Update: DeserializeOwned + Send + 'static;

    /// Fields clients may filter and sort on
    const FIELDS: &'static [FieldSpec];

    async fn list(&self, retrieval: &Retrieval) -> ApiResult<Vec<Self::Record>>;

    /// Fetch one record with its relations populated
    async fn find(&self, id: Uuid) -> ApiResult<Option<Self::Record>>;

    async fn create(&self, input: Self::Create) -> ApiResult<Self::Record>;

    async fn update(&self, id: Uuid, input: Self::Update) -> ApiResult<Option<Self::Record>>;

    /// Returns false when nothing matched
    async fn delete(&self, id: Uuid) -> ApiResult<bool>;
}
