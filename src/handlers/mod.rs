//! HTTP request handlers.

pub mod auth;
pub mod campaigns;
pub mod challenges;
pub mod cron;
pub mod guest_access;
pub mod health;
pub mod journey;
pub mod leaderboard;
pub mod observations;
