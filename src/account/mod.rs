mod core;
mod endpoints;

pub use core::{
    Account, AccountData, create_account, create_account_table, delete_account, get_account,
    get_all_accounts, map_row_to_account, update_account,
};
pub use endpoints::{
    AccountState, create_account_endpoint, delete_account_endpoint, get_account_endpoint,
    get_accounts_endpoint, update_account_endpoint,
};
