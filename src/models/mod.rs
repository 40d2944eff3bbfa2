pub mod event;
pub mod forwarding;
