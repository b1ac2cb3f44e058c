pub mod client;
pub mod form;
pub mod outbox;
pub mod watermark;
