pub mod affordability;
pub mod args;
pub mod error;
pub mod intent;
pub mod models;
pub mod recommend;
pub mod verify;

pub use affordability::{evaluate_affordability, AffordabilityInput, AffordabilityReport};
pub use args::{lenient_json, merge_preferences, parse_f64_or, parse_inline_args};
pub use error::RentError;
pub use intent::{classify_intent, normalize_text, scan_city, scan_property_type};
pub use models::*;
pub use recommend::{suggest_neighbourhoods, Recommendation, ScoringWeights, SuggestRequest};
pub use verify::Verifier;
