mod admin;
mod auth;
mod study;
mod tasks;
mod utils;
