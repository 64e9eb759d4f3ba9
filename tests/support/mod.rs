#![allow(dead_code)]

pub mod astro_env;
pub mod backend;
