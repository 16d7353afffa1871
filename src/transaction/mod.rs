mod core;
mod endpoints;

pub use core::{
    TRANSACTION_COLUMNS, Transaction, TransactionBuilder, TransactionKind, TransactionSource,
    UpdateTransaction, count_transactions, create_transaction, create_transaction_table,
    delete_transaction, get_latest_transaction_by_display_name, get_recent_amount_cents,
    get_transaction, list_transactions, map_row_to_transaction, update_transaction,
};
pub use endpoints::{
    CreateTransactionRequest, TransactionFilter, TransactionState, create_transaction_endpoint,
    delete_transaction_endpoint, get_transaction_endpoint, get_transactions_endpoint,
    update_transaction_endpoint,
};
