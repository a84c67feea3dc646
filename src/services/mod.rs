pub mod distance;
pub mod oauth;
pub mod objects;
pub mod sessions;
pub mod trips;
