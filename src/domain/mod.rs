//! Core domain types and the error taxonomy shared by every component.

mod accuracy;
mod approval;
mod error;
mod feedback;
mod item;
mod price;
mod recommend;
mod run;
mod weights;

pub use accuracy::{AccuracyRecord, CategoryAccuracy};
pub use approval::{ApprovalAction, ApprovalEvent, LineSnapshot, RejectReason};
pub use error::{InventoryOpsError, Result};
pub use feedback::{
    FeedbackEntry, FeedbackType, NewFeedback, RetrainRequest, RetrainSource,
};
pub use item::{Item, UsagePoint};
pub use price::{
    EffectivePrice, IngredientCost, PriceRecord, PriceSource, Recipe,
    RecipeCostResult, RecipeIngredient,
};
pub use recommend::{AbcClass, Recommendation, RecommendationStatus};
pub use run::{
    ApprovalStatus, ForecastLine, ForecastRun, OrderReason, OrderStatus,
    RunStats, RunStatus, SignalContributions,
};
pub use weights::{SignalKind, WeightVector, MAX_WEIGHT_STEP};
