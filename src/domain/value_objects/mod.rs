pub mod month_anchor;
pub mod month_window;
pub mod subscriptions;
