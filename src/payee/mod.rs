mod core;
mod endpoints;
pub mod matcher;

pub use core::{
    MatchRule, Payee, PayeeData, create_payee, create_payee_table, delete_payee, get_all_payees,
    get_payee, map_row_to_payee, update_payee,
};
pub use endpoints::{
    CreatePayeeRequest, LatestTransaction, PayeeState, PayeeWithRule, RematchResponse,
    UpdatePayeeRequest, create_payee_endpoint, delete_payee_endpoint,
    get_latest_payee_transaction_endpoint, get_payee_endpoint, get_payee_matches_endpoint,
    get_payees_endpoint, preview_payee_matches_endpoint, rematch_payee_endpoint,
    rematch_payees_endpoint, update_payee_endpoint,
};
