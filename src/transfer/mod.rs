mod core;
mod endpoints;

pub use core::{
    convert_to_transfer, create_transfer, delete_transfer_pair, unlink_account_transfers,
    update_transfer_pair,
};
pub use endpoints::{ConvertTransferRequest, TransferState, convert_transfer_endpoint};
