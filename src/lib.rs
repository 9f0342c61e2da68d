#[allow(non_snake_case)]
pub mod Computations;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Examples;
pub mod settings;
