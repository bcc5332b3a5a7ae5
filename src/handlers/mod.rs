pub mod admin;
pub mod artists;
pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod categories;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod reviews;
