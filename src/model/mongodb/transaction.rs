use log::info;
use mongodb::{
    bson::{doc, Document},
    error::{Error as DbError, ErrorKind, TRANSIENT_TRANSACTION_ERROR},
    Client,
};

/// Server error code for `IllegalOperation`, returned by a standalone server
/// when asked to run a transaction.
pub const ILLEGAL_OPERATION: i32 = 20;

/// How many times a transaction that hit a transient error, such as a write
/// conflict with a concurrent transaction, is attempted in total.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Whether the connected deployment can run multi-document transactions.
///
/// Only replica sets and sharded clusters can; a standalone server cannot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransactionSupport(bool);

impl TransactionSupport {
    pub const fn new(supported: bool) -> Self {
        Self(supported)
    }

    pub fn is_supported(&self) -> bool {
        self.0
    }

    /// Ask the server what kind of deployment it belongs to.
    pub async fn probe(client: &Client) -> Result<Self, DbError> {
        let hello = client
            .database("admin")
            .run_command(doc! { "hello": 1 }, None)
            .await?;
        let support = Self::from_hello(&hello);
        info!(
            "Database deployment {} multi-document transactions",
            if support.is_supported() {
                "supports"
            } else {
                "does not support"
            }
        );
        Ok(support)
    }

    /// Interpret the reply to a `hello` command.
    fn from_hello(hello: &Document) -> Self {
        let replica_set = hello.get_str("setName").is_ok();
        let mongos = hello.get_str("msg").map_or(false, |msg| msg == "isdbgrid");
        Self(replica_set || mongos)
    }
}

/// Return true if the error means the deployment refused to run a transaction,
/// either because the server rejected the transaction number or because the
/// driver knows the topology cannot support transactions.
pub fn is_transaction_unsupported(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Command(ref e) => e.code == ILLEGAL_OPERATION,
        ErrorKind::Transaction { .. } => true,
        _ => false,
    }
}

/// Return true if the whole transaction may succeed when run again.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

#[cfg(test)]
mod tests {
    use mongodb::error::CommandError;

    use super::*;

    #[test]
    fn standalone_does_not_support_transactions() {
        let hello = doc! { "isWritablePrimary": true, "maxWireVersion": 17 };
        assert!(!TransactionSupport::from_hello(&hello).is_supported());
    }

    #[test]
    fn replica_set_and_mongos_support_transactions() {
        let replica = doc! { "isWritablePrimary": true, "setName": "rs0" };
        assert!(TransactionSupport::from_hello(&replica).is_supported());

        let mongos = doc! { "isWritablePrimary": true, "msg": "isdbgrid" };
        assert!(TransactionSupport::from_hello(&mongos).is_supported());
    }

    #[test]
    fn refused_transactions_are_fallbacks() {
        let err = DbError::from(ErrorKind::Transaction {
            message: "Transactions are not supported by this deployment".to_string(),
        });
        assert!(is_transaction_unsupported(&err));

        // `CommandError` is only built by the driver, so go through its reply format.
        let reply: CommandError = mongodb::bson::from_document(doc! {
            "code": ILLEGAL_OPERATION,
            "codeName": "IllegalOperation",
            "errmsg": "Transaction numbers are only allowed on a replica set member or mongos",
        })
        .unwrap();
        let err = DbError::from(ErrorKind::Command(reply));
        assert!(is_transaction_unsupported(&err));
        assert!(!is_transient_transaction_error(&err));
    }

    #[test]
    fn other_command_errors_are_not_fallbacks() {
        let reply: CommandError = mongodb::bson::from_document(doc! {
            "code": 11000,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error",
        })
        .unwrap();
        assert!(!is_transaction_unsupported(&DbError::from(ErrorKind::Command(reply))));
    }

    #[test]
    fn unrelated_errors_are_not_fallbacks() {
        let err = DbError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        assert!(!is_transaction_unsupported(&err));
        assert!(!is_transient_transaction_error(&err));
    }
}
