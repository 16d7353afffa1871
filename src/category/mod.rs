mod core;
mod endpoints;

pub use core::{
    Category, CategoryData, create_category, create_category_table, delete_category, get_category,
    get_all_categories, map_row_to_category, update_category,
};
pub use endpoints::{
    CategoryState, create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
    get_category_endpoint, update_category_endpoint,
};
