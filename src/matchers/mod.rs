//! Source matchers: the independent lookups the resolver aggregates.
//!
//! Query cost rises left to right, and so does the order the resolver
//! consults them: local dictionary, user-confirmed dynamic list, then the
//! external terminology validator. The drug-confusion matcher runs
//! separately over the whole snapshot and its verdict outranks plain
//! spelling classification.

pub mod confusion;
pub mod dictionary;
pub mod dynamic_list;
pub mod validator;

pub use confusion::ConfusionTable;
pub use dictionary::{similarity, Dictionary, DictionaryLookup};
pub use dynamic_list::{DynamicList, DynamicListError};
pub use validator::{
    BreakerSettings, CircuitBreaker, GuardedValidator, HttpTerminologyService, TerminologyService,
    ValidationOutcome, ValidatorError,
};
