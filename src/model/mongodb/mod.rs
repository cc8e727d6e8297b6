mod bson;
mod collection;
mod errors;
mod transaction;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_duplicate_key_error;
pub use transaction::{
    is_transaction_unsupported, is_transient_transaction_error, TransactionSupport,
    MAX_TRANSACTION_ATTEMPTS,
};
