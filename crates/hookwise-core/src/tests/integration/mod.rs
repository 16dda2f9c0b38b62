#![cfg(test)]

pub mod plugins;
pub mod scenario_tests;
