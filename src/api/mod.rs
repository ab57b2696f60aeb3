// API routes and handlers

pub mod auth;
pub mod calendar;
pub mod finance;
pub mod health;
pub mod marketplace;
pub mod notifications;
pub mod quotes;
pub mod routes;
pub mod scheduling;
pub mod store;
pub mod workouts;
