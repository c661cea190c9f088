#![allow(dead_code)]

pub mod trackvault_env;
pub mod wav;
