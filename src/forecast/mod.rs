pub mod dismissal;
mod endpoints;
pub mod projector;
pub mod template;

pub use dismissal::{
    clear_dismissals, count_dismissals_since, create_forecast_dismissal_table, dismiss_forecast,
    get_dismissed_periods, purge_stale_dismissals,
};
pub use endpoints::{
    DismissRequest, DismissalQuery, ForecastQuery, ForecastState, clear_dismissals_endpoint,
    count_dismissals_endpoint, dismiss_forecast_endpoint, get_forecasts_endpoint,
};
pub use projector::{ForecastItem, first_of_month, project_forecasts};
pub use template::{
    AmountMethod, Frequency, RecurringRule, RecurringTemplate, create_recurring_template_table,
    delete_templates_for_payee, get_active_template_for_payee, get_active_templates_for_account,
    map_row_to_template, upsert_template_for_payee,
};
