pub mod bulk;
pub mod dto;
pub mod export;
pub mod lifecycle;
pub mod models;
pub mod repository;

pub use dto::{BulkFilter, IncotermInput, OfferInput, OfferListQuery, PageQuery, PriceTierInput};
pub use export::{ExportMode, ExportOutput, ExportService};
pub use lifecycle::{OfferError, OfferManager};
pub use models::{
    CountryRule, Incoterm, IncotermName, Offer, OfferChildren, OfferDetails, OfferRecord,
    OfferSource, OfferStatus, OfferUnit, OwnerKind, OwnerRef, PriceDisplayUnit, PriceTier,
    ViewedOffer,
};
pub use repository::{OfferStore, PublishGuard};
