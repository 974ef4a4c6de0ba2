pub mod crew;
pub mod notification;
pub mod player;
pub mod request;
pub mod response;
