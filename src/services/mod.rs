pub mod account_service;
pub mod content_service;
pub mod dispatcher;
pub mod health_service;
pub mod live_view;
pub mod recipients;
pub mod sweeper;
